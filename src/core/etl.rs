use crate::core::decoder::RecordDecoder;
use crate::core::progress::ProgressReporter;
use crate::core::{encoder, filter, reshaper, AttributeLookup, Record};
use crate::domain::model::{ExportOutput, CUSTOMER_GROUP, CUSTOMER_ID, NOT_AVAILABLE, EXPIRATION_DATE};
use crate::utils::error::{ExportError, Result};
use chrono::{DateTime, Local};
use std::io::Read;
use std::time::Instant;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Idle,
    Decoding,
    Filtering,
    Enriching,
    Encoding,
    Done,
    Errored,
}

/// 單次執行的計數器，執行結束即丟棄
#[derive(Debug)]
pub struct RunState {
    phase: RunPhase,
    total: usize,
    processed: usize,
}

impl Default for RunState {
    fn default() -> Self {
        Self::new()
    }
}

impl RunState {
    pub fn new() -> Self {
        Self {
            phase: RunPhase::Idle,
            total: 0,
            processed: 0,
        }
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn processed(&self) -> usize {
        self.processed
    }

    fn advance(&mut self, next: RunPhase) {
        tracing::debug!(
            "Run phase {:?} -> {:?} ({}/{})",
            self.phase,
            next,
            self.processed,
            self.total
        );
        self.phase = next;
    }

    fn record_processed(&mut self) {
        self.processed += 1;
    }

    /// 完成比例，介於 0 與 1 之間
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.processed as f64 / self.total as f64
        }
    }
}

/// 依時間產生輸出檔名：`expired-customers-YYYY-MM-DD-THHMMSS.csv`
pub fn output_file_name(now: DateTime<Local>) -> String {
    now.format("expired-customers-%Y-%m-%d-T%H%M%S.csv").to_string()
}

/// 管線協調者：解碼 → 過濾 → 查詢 → 編碼，同一時間只允許一次執行
pub struct ExportEngine<L: AttributeLookup> {
    lookup: L,
    run_gate: Mutex<()>,
}

impl<L: AttributeLookup> ExportEngine<L> {
    pub fn new(lookup: L) -> Self {
        Self {
            lookup,
            run_gate: Mutex::new(()),
        }
    }

    pub fn lookup(&self) -> &L {
        &self.lookup
    }

    pub fn is_busy(&self) -> bool {
        self.run_gate.try_lock().is_err()
    }

    pub async fn run<R: Read>(
        &self,
        input: R,
        progress: &ProgressReporter,
        cancel: &CancellationToken,
    ) -> Result<ExportOutput> {
        let _guard = self.run_gate.try_lock().map_err(|_| {
            tracing::warn!("⛔ Rejected export: another run is in progress");
            ExportError::RunInProgress
        })?;

        let started = Instant::now();
        let mut state = RunState::new();

        match self.execute(input, progress, cancel, &mut state).await {
            Ok(output) => {
                state.advance(RunPhase::Done);
                tracing::info!(
                    "✅ Export {} finished: {} records, {} with expiration dates, {:?}",
                    output.file_name,
                    output.records,
                    output.enriched,
                    started.elapsed()
                );
                Ok(output)
            }
            Err(e) => {
                let failed_in = state.phase();
                state.advance(RunPhase::Errored);
                tracing::error!(
                    "❌ Export failed during {:?} after {}/{} records: {}",
                    failed_in,
                    state.processed(),
                    state.total(),
                    e
                );
                Err(e)
            }
        }
    }

    async fn execute<R: Read>(
        &self,
        input: R,
        progress: &ProgressReporter,
        cancel: &CancellationToken,
        state: &mut RunState,
    ) -> Result<ExportOutput> {
        // 解碼與過濾都在第一個 await 之前完成，解碼器不會跨越暫停點
        let (kept, width) = Self::decode_and_filter(input, state)?;

        state.advance(RunPhase::Enriching);
        state.total = kept.len();
        tracing::info!("📋 {} customers matched the allowed groups", state.total);

        let mut transformed = Vec::with_capacity(kept.len());
        let mut enriched = 0;

        for mut record in kept {
            reshaper::repair_overflow(&mut record, width);

            let customer_id = record.get(CUSTOMER_ID).unwrap_or_default().to_string();
            let expiration = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ExportError::Cancelled),
                value = self.lookup.lookup(&customer_id) => value,
            };

            reshaper::rewrite(&mut record, expiration);
            if record.get(EXPIRATION_DATE) != Some(NOT_AVAILABLE) {
                enriched += 1;
            }
            transformed.push(record);

            state.record_processed();
            progress.report(state.processed(), state.total());
        }

        state.advance(RunPhase::Encoding);
        let body = encoder::encode(&transformed)?;

        Ok(ExportOutput {
            file_name: output_file_name(Local::now()),
            body,
            records: transformed.len(),
            enriched,
        })
    }

    fn decode_and_filter<R: Read>(input: R, state: &mut RunState) -> Result<(Vec<Record>, usize)> {
        state.advance(RunPhase::Decoding);
        let decoder = RecordDecoder::new(input)?;

        if !decoder.header().iter().any(|name| name == CUSTOMER_GROUP) {
            return Err(ExportError::decode(format!(
                "header is missing the '{}' column",
                CUSTOMER_GROUP
            )));
        }
        let width = decoder.header().len();

        let records = decoder.collect::<Result<Vec<_>>>()?;
        tracing::info!("📥 Decoded {} rows", records.len());

        state.advance(RunPhase::Filtering);
        let kept = filter::filter_records(records)?;
        if kept.is_empty() {
            return Err(ExportError::NoMatchingRecords);
        }

        Ok((kept, width))
    }
}
