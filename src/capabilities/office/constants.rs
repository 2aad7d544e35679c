//! Propiedades de paquetes OOXML que se restablecen al limpiar.

pub(super) const DC_NS: &str = "http://purl.org/dc/elements/1.1/";
pub(super) const CP_NS: &str =
    "http://schemas.openxmlformats.org/package/2006/metadata/core-properties";
pub(super) const DCTERMS_NS: &str = "http://purl.org/dc/terms/";
pub(super) const APP_NS: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/extended-properties";

pub(super) const CORE_PART: &str = "docProps/core.xml";
pub(super) const APP_PART: &str = "docProps/app.xml";
pub(super) const CUSTOM_PART: &str = "docProps/custom.xml";

/// Elemento de propiedades y valor con el que queda tras la limpieza.
#[derive(Clone, Copy, Debug)]
pub(super) struct PropertyReset {
    pub prefix: Option<&'static str>,
    pub local_name: &'static str,
    pub namespace: &'static str,
    pub value: &'static str,
}

const fn core(prefix: &'static str, local_name: &'static str, namespace: &'static str) -> PropertyReset {
    PropertyReset {
        prefix: Some(prefix),
        local_name,
        namespace,
        value: "",
    }
}

const fn app(local_name: &'static str, value: &'static str) -> PropertyReset {
    PropertyReset {
        prefix: None,
        local_name,
        namespace: APP_NS,
        value,
    }
}

pub(super) const CORE_RESETS: [PropertyReset; 11] = [
    core("dc", "creator", DC_NS),
    core("cp", "lastModifiedBy", CP_NS),
    core("dcterms", "created", DCTERMS_NS),
    core("dcterms", "modified", DCTERMS_NS),
    core("dc", "title", DC_NS),
    core("dc", "subject", DC_NS),
    core("dc", "description", DC_NS),
    core("cp", "keywords", CP_NS),
    core("cp", "category", CP_NS),
    core("cp", "contentStatus", CP_NS),
    PropertyReset {
        value: "1",
        ..core("cp", "revision", CP_NS)
    },
];

pub(super) const APP_RESETS: [PropertyReset; 6] = [
    app("Application", ""),
    app("Company", ""),
    app("Manager", ""),
    app("Pages", "0"),
    app("Words", "0"),
    app("Lines", "0"),
];

pub(super) const EMPTY_CUSTOM_PROPERTIES: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n<Properties xmlns=\"http://schemas.openxmlformats.org/officeDocument/2006/custom-properties\" xmlns:vt=\"http://schemas.openxmlformats.org/officeDocument/2006/docPropsVTypes\"/>\n";
