use super::ExportError;
use std::io::Write;

/// Write any serializable data structure as pretty-printed JSON
pub fn write_json<T, W>(data: &T, mut writer: W) -> Result<(), ExportError>
where
    T: serde::Serialize,
    W: Write,
{
    serde_json::to_writer_pretty(&mut writer, data)
        .map_err(|e| ExportError::SerializationError(e.to_string()))?;
    writeln!(writer)?;
    writer.flush()?;

    Ok(())
}
