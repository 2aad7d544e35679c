use anyhow::Context;
use std::io::{Cursor, Read, Write};
use zip::write::FileOptions;
use zip::{ZipArchive, ZipWriter};

/// Reescribe un paquete ZIP en memoria aplicando `transform` a cada entrada.
/// La transformación devuelve el nuevo contenido, o `None` para conservarlo.
pub(super) fn rewrite_package<F>(bytes: &[u8], mut transform: F) -> anyhow::Result<(Vec<u8>, usize)>
where
    F: FnMut(&str, &[u8]) -> anyhow::Result<Option<Vec<u8>>>,
{
    let mut archive =
        ZipArchive::new(Cursor::new(bytes)).context("No es un documento Office válido")?;
    let mut writer = ZipWriter::new(Cursor::new(Vec::with_capacity(bytes.len())));
    let mut rewritten = 0;

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .context("Error leyendo archivo del ZIP")?;
        let name = entry.name().to_string();

        let mut options = FileOptions::<'_, ()>::default().compression_method(entry.compression());
        if let Some(mode) = entry.unix_mode() {
            options = options.unix_permissions(mode);
        }
        if let Some(time) = entry.last_modified() {
            options = options.last_modified_time(time);
        }

        if entry.is_dir() {
            writer
                .add_directory(name, options)
                .context("Error creando directorio en ZIP")?;
            continue;
        }

        let mut contents = Vec::new();
        entry
            .read_to_end(&mut contents)
            .with_context(|| format!("Error leyendo `{name}`"))?;

        let data = match transform(&name, &contents).with_context(|| name.clone())? {
            Some(replacement) => {
                rewritten += 1;
                replacement
            }
            None => contents,
        };

        writer
            .start_file(name, options)
            .context("Error escribiendo contenido")?;
        writer.write_all(&data).context("Error escribiendo contenido")?;
    }

    let output = writer.finish().context("Error finalizando archivo")?;
    Ok((output.into_inner(), rewritten))
}

/// Contenido de una entrada, o `None` si el paquete no la incluye.
pub(super) fn read_part(bytes: &[u8], name: &str) -> anyhow::Result<Option<Vec<u8>>> {
    let mut archive =
        ZipArchive::new(Cursor::new(bytes)).context("No es un documento Office válido")?;

    let mut entry = match archive.by_name(name) {
        Ok(entry) => entry,
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(e).with_context(|| format!("No se pudo acceder a {name}")),
    };

    let mut contents = Vec::new();
    entry
        .read_to_end(&mut contents)
        .with_context(|| format!("No se pudo leer {name}"))?;
    Ok(Some(contents))
}
