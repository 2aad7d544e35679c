use serde::{Deserialize, Serialize};

use crate::file_record::extension_of;

const IMAGE_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "bmp", "webp", "heic", "ppm", "tiff", "svg", "svgz", "avif",
    "avifs",
];
const VIDEO_EXTENSIONS: &[&str] = &[
    "mp4", "webm", "ogv", "mpg", "mpeg", "m1v", "m4v", "avi", "mkv", "mov", "wmv",
];
const AUDIO_EXTENSIONS: &[&str] = &["mp3", "aac", "wav", "wv", "ogg", "opus", "flac"];
const DOCUMENT_EXTENSIONS: &[&str] = &[
    "pdf", "doc", "dot", "docx", "dotx", "docm", "dotm", "xls", "xlt", "xla", "xlsx", "xltx",
    "xlsm", "xltm", "xlam", "xlsb", "ppt", "pot", "pps", "ppa", "pptx", "potx", "ppsx", "ppam",
    "pptm", "potm", "ppsm", "mdb", "odt", "ods", "odp", "odg", "odc", "odf", "odi", "odm", "odb",
    "ott", "ots", "otp", "otg", "otc", "oti", "oth", "epub",
];

/// Categoría estadística de un archivo; no decide qué limpiador lo procesa.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileCategory {
    Image,
    Video,
    Audio,
    Document,
    Other,
}

impl FileCategory {
    pub fn label(self) -> &'static str {
        match self {
            FileCategory::Image => "imagen",
            FileCategory::Video => "video",
            FileCategory::Audio => "audio",
            FileCategory::Document => "documento",
            FileCategory::Other => "otro",
        }
    }
}

pub fn classify(filename: &str) -> FileCategory {
    let Some(ext) = extension_of(filename) else {
        return FileCategory::Other;
    };

    let ext = ext.as_str();
    if IMAGE_EXTENSIONS.contains(&ext) {
        FileCategory::Image
    } else if VIDEO_EXTENSIONS.contains(&ext) {
        FileCategory::Video
    } else if AUDIO_EXTENSIONS.contains(&ext) {
        FileCategory::Audio
    } else if DOCUMENT_EXTENSIONS.contains(&ext) {
        FileCategory::Document
    } else {
        FileCategory::Other
    }
}
