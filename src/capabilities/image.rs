//! Limpieza de imágenes: decodifica y vuelve a codificar los píxeles, lo que
//! descarta EXIF, XMP y cualquier otro bloque auxiliar.

use anyhow::{Context, bail};
use async_trait::async_trait;
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;
use tracing::debug;

use crate::cleaner::Capability;
use crate::file_record::FileRecord;

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "bmp", "webp"];

#[derive(Clone, Copy, Debug, Default)]
pub struct ImageCapability;

#[async_trait]
impl Capability for ImageCapability {
    fn name(&self) -> &str {
        "imagen"
    }

    async fn clean(&self, file: &FileRecord) -> anyhow::Result<Vec<u8>> {
        let bytes = file.bytes.clone();
        tokio::task::spawn_blocking(move || clean_image(&bytes))
            .await
            .context("La limpieza de la imagen terminó de forma inesperada")?
    }
}

/// Vuelve a codificar la imagen en su formato original y verifica que no
/// queden campos EXIF.
pub fn clean_image(bytes: &[u8]) -> anyhow::Result<Vec<u8>> {
    let format = image::guess_format(bytes).context("Formato de imagen no reconocido")?;
    let img = image::load_from_memory_with_format(bytes, format)
        .context("No se pudo decodificar la imagen")?;

    let img = match format {
        ImageFormat::Jpeg => DynamicImage::ImageRgb8(img.to_rgb8()),
        ImageFormat::Png => img,
        _ => DynamicImage::ImageRgba8(img.to_rgba8()),
    };

    let mut output = Vec::with_capacity(bytes.len());
    img.write_to(&mut Cursor::new(&mut output), format)
        .context("No se pudo guardar la imagen limpia")?;

    if !verify_image_clean(&output)? {
        bail!("La verificación indicó que la metadata no se eliminó correctamente");
    }

    debug!(
        ?format,
        original = bytes.len(),
        cleaned = output.len(),
        "imagen recodificada"
    );
    Ok(output)
}

/// Comprueba que una imagen carece de campos EXIF residuales.
pub fn verify_image_clean(bytes: &[u8]) -> anyhow::Result<bool> {
    let mut reader = Cursor::new(bytes);

    match exif::Reader::new().read_from_container(&mut reader) {
        Ok(exif) => Ok(exif.fields().next().is_none()),
        Err(exif::Error::NotFound(_)) | Err(exif::Error::BlankValue(_)) => Ok(true),
        Err(exif::Error::InvalidFormat(_)) => Ok(true),
        Err(exif::Error::Io(err)) => {
            Err(err).context("No se pudo leer metadata EXIF durante la verificación")
        }
        Err(other) => bail!("Error verificando metadata EXIF: {other}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage, Rgba, RgbaImage};

    // Segmento APP1 con un IFD big-endian y un único campo Make = "Abc".
    const EXIF_SEGMENT: &[u8] = &[
        0xFF, 0xE1, 0x00, 0x22, b'E', b'x', b'i', b'f', 0x00, 0x00, b'M', b'M', 0x00, 0x2A, 0x00,
        0x00, 0x00, 0x08, 0x00, 0x01, 0x01, 0x0F, 0x00, 0x02, 0x00, 0x00, 0x00, 0x04, b'A', b'b',
        b'c', 0x00, 0x00, 0x00, 0x00, 0x00,
    ];

    fn encode(img: DynamicImage, format: ImageFormat) -> Vec<u8> {
        let mut output = Vec::new();
        img.write_to(&mut Cursor::new(&mut output), format)
            .expect("no se pudo codificar la imagen de prueba");
        output
    }

    fn jpeg_with_exif() -> Vec<u8> {
        let img = RgbImage::from_pixel(8, 8, Rgb([200, 40, 40]));
        let plain = encode(DynamicImage::ImageRgb8(img), ImageFormat::Jpeg);

        // Inserta el segmento justo después del marcador SOI.
        let mut tagged = plain[..2].to_vec();
        tagged.extend_from_slice(EXIF_SEGMENT);
        tagged.extend_from_slice(&plain[2..]);
        tagged
    }

    #[test]
    fn jpeg_exif_is_removed() -> anyhow::Result<()> {
        let dirty = jpeg_with_exif();
        assert!(!verify_image_clean(&dirty)?);

        let cleaned = clean_image(&dirty)?;
        assert!(verify_image_clean(&cleaned)?);
        assert_eq!(image::guess_format(&cleaned)?, ImageFormat::Jpeg);
        Ok(())
    }

    #[test]
    fn png_keeps_dimensions() -> anyhow::Result<()> {
        let img = RgbaImage::from_pixel(3, 2, Rgba([10, 20, 30, 255]));
        let original = encode(DynamicImage::ImageRgba8(img), ImageFormat::Png);

        let cleaned = clean_image(&original)?;
        let decoded = image::load_from_memory(&cleaned)?;
        assert_eq!((decoded.width(), decoded.height()), (3, 2));
        Ok(())
    }

    #[test]
    fn unknown_bytes_are_rejected() {
        assert!(clean_image(b"no es una imagen").is_err());
    }

    #[tokio::test]
    async fn capability_cleans_jpeg() -> anyhow::Result<()> {
        let file = FileRecord::new("foto.jpg", "image/jpeg", jpeg_with_exif());
        let cleaned = ImageCapability.clean(&file).await?;
        assert!(verify_image_clean(&cleaned)?);
        Ok(())
    }
}
