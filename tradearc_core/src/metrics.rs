use tradearc_observability::{Counter, Histogram};

pub struct PipelineMetrics {
    pub normalize_duration: Histogram<f64>,
    pub archive_duration: Histogram<f64>,
    pub accepted_records: Counter<u64>,
    pub rejected_records: Counter<u64>,
    pub archived_bytes: Counter<u64>,
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        let meter = tradearc_observability::meter("pipeline");
        Self {
            normalize_duration: meter
                .f64_histogram("tradearc.normalize.duration")
                .with_unit("s")
                .with_description("time spent normalizing a raw batch")
                .build(),
            archive_duration: meter
                .f64_histogram("tradearc.archive.duration")
                .with_unit("s")
                .with_description("time spent archiving a normalized batch")
                .build(),
            accepted_records: meter
                .u64_counter("tradearc.records.accepted")
                .with_unit("{record}")
                .with_description("number of records that normalized successfully")
                .build(),
            rejected_records: meter
                .u64_counter("tradearc.records.rejected")
                .with_unit("{record}")
                .with_description("number of malformed records skipped")
                .build(),
            archived_bytes: meter
                .u64_counter("tradearc.archive.bytes")
                .with_unit("By")
                .with_description("bytes uploaded to the archive bucket")
                .build(),
        }
    }
}
