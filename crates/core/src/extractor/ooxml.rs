use crate::error::ExtractionError;
use std::io::{Cursor, Read};
use zip::ZipArchive;

pub(crate) type Package<'a> = ZipArchive<Cursor<&'a [u8]>>;

pub(crate) fn open_package(bytes: &[u8]) -> Result<Package<'_>, ExtractionError> {
    Ok(ZipArchive::new(Cursor::new(bytes))?)
}

pub(crate) fn read_part(package: &mut Package<'_>, name: &str) -> Result<Vec<u8>, ExtractionError> {
    let mut entry = package.by_name(name)?;
    let mut xml = Vec::with_capacity(entry.size() as usize);
    entry.read_to_end(&mut xml)?;
    Ok(xml)
}

#[cfg(test)]
pub(crate) fn package(parts: &[(&str, &str)]) -> Vec<u8> {
    use std::io::Write;
    use zip::write::SimpleFileOptions;
    use zip::{CompressionMethod, ZipWriter};

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, body) in parts {
        writer
            .start_file(
                *name,
                SimpleFileOptions::default().compression_method(CompressionMethod::Stored),
            )
            .expect("part should start");
        writer
            .write_all(body.as_bytes())
            .expect("part should be written");
    }
    writer.finish().expect("package should finish").into_inner()
}
