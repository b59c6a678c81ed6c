use crate::core::Record;
use crate::utils::error::{ExportError, Result};
use csv::{QuoteStyle, Terminator, WriterBuilder};

/// 以第一筆記錄的欄位順序作為標頭輸出 CSV，每行（含最後一行）都以 `\n` 結尾。
/// 含有分隔符、引號或換行的值會加上引號，內部引號加倍。
pub fn encode(records: &[Record]) -> Result<Vec<u8>> {
    let first = records.first().ok_or(ExportError::EncodeEmpty)?;
    let header: Vec<&str> = first.keys().collect();

    let mut writer = WriterBuilder::new()
        .has_headers(false)
        .delimiter(b',')
        .quote(b'"')
        .double_quote(true)
        .quote_style(QuoteStyle::Necessary)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    writer
        .write_record(&header)
        .map_err(|e| ExportError::encode(e.to_string()))?;

    for record in records {
        let row = header.iter().map(|key| record.get(key).unwrap_or_default());
        writer
            .write_record(row)
            .map_err(|e| ExportError::encode(e.to_string()))?;
    }

    let body = writer
        .into_inner()
        .map_err(|e| ExportError::encode(e.to_string()))?;

    tracing::debug!("Encoded {} records ({} bytes)", records.len(), body.len());
    Ok(body)
}
