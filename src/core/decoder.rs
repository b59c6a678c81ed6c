//! CSV 解碼：把位元組串流轉成以標頭為鍵的 `Record` 序列。

use crate::core::Record;
use crate::utils::error::{ExportError, Result};
use csv::{ReaderBuilder, StringRecord};
use std::io::Read;

const DELIMITER: u8 = b',';
const QUOTE: u8 = b'"';

/// 保留尚未確認完整的原始位元組，供檔尾檢查未閉合的引號
struct TailReader<R> {
    inner: R,
    tail: Vec<u8>,
    tail_start: u64,
}

impl<R: Read> TailReader<R> {
    fn new(inner: R) -> Self {
        Self {
            inner,
            tail: Vec::new(),
            tail_start: 0,
        }
    }

    fn discard_before(&mut self, offset: u64) {
        if offset <= self.tail_start {
            return;
        }
        let n = ((offset - self.tail_start) as usize).min(self.tail.len());
        self.tail.drain(..n);
        self.tail_start += n as u64;
    }

    fn tail_from(&self, offset: u64) -> &[u8] {
        let skip = offset.saturating_sub(self.tail_start) as usize;
        self.tail.get(skip..).unwrap_or_default()
    }
}

impl<R: Read> Read for TailReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.tail.extend_from_slice(&buf[..n]);
        Ok(n)
    }
}

/// `csv` 在檔尾遇到未閉合引號時不會報錯，這裡從一筆記錄的開頭重新掃描
fn ends_inside_quotes(raw: &[u8]) -> bool {
    let mut in_quotes = false;
    let mut at_field_start = true;
    let mut i = 0;

    while i < raw.len() {
        let b = raw[i];
        if in_quotes {
            if b == QUOTE {
                if raw.get(i + 1) == Some(&QUOTE) {
                    i += 1;
                } else {
                    in_quotes = false;
                }
            }
        } else if b == QUOTE && at_field_start {
            in_quotes = true;
            at_field_start = false;
        } else {
            at_field_start = matches!(b, DELIMITER | b'\n' | b'\r');
        }
        i += 1;
    }

    in_quotes
}

fn decode_error(e: csv::Error) -> ExportError {
    ExportError::decode(e.to_string())
}

/// 惰性、有限、不可重來的記錄序列；第一列為標頭
pub struct RecordDecoder<R: Read> {
    reader: csv::Reader<TailReader<R>>,
    header: Vec<String>,
    row: StringRecord,
    last_start: u64,
    rows: usize,
    finished: bool,
}

impl<R: Read> RecordDecoder<R> {
    pub fn new(input: R) -> Result<Self> {
        let mut reader = ReaderBuilder::new()
            .delimiter(DELIMITER)
            .quote(QUOTE)
            .double_quote(true)
            .has_headers(true)
            .flexible(true)
            .from_reader(TailReader::new(input));

        let header: Vec<String> = reader
            .headers()
            .map_err(decode_error)?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();

        if header.iter().all(String::is_empty) {
            return Err(ExportError::decode("missing header row"));
        }

        tracing::debug!("CSV header: {:?}", header);

        Ok(Self {
            reader,
            header,
            row: StringRecord::new(),
            last_start: 0,
            rows: 0,
            finished: false,
        })
    }

    pub fn header(&self) -> &[String] {
        &self.header
    }

    fn build_record(&self) -> Record {
        let mut record = Record::new();
        for (index, value) in self.row.iter().enumerate() {
            match self.header.get(index) {
                Some(name) => record.insert(name.as_str(), value),
                // 超出標頭的欄位先以位置命名，之後由 reshaper 合併
                None => record.insert(format!("_{}", index), value),
            }
        }
        for name in self.header.iter().skip(self.row.len()) {
            record.insert(name.as_str(), "");
        }
        record
    }

    fn check_tail(&self) -> Result<()> {
        if ends_inside_quotes(self.reader.get_ref().tail_from(self.last_start)) {
            return Err(ExportError::decode(format!(
                "unterminated quoted field starting at byte {}",
                self.last_start
            )));
        }
        Ok(())
    }
}

impl<R: Read> Iterator for RecordDecoder<R> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        match self.reader.read_record(&mut self.row) {
            Ok(true) => {
                if let Some(position) = self.row.position() {
                    self.last_start = position.byte();
                    let start = self.last_start;
                    self.reader.get_mut().discard_before(start);
                }
                self.rows += 1;
                Some(Ok(self.build_record()))
            }
            Ok(false) => {
                self.finished = true;
                tracing::debug!("Decoded {} rows", self.rows);
                self.check_tail().err().map(Err)
            }
            Err(e) => {
                self.finished = true;
                Some(Err(decode_error(e)))
            }
        }
    }
}
