use backfill_observability::Counter;

pub struct ImportMetrics {
    pub started: Counter<u64>,
    pub rejected: Counter<u64>,
    pub completed: Counter<u64>,
    pub deleted: Counter<u64>,
    pub imported_events: Counter<u64>,
    pub skipped_events: Counter<u64>,
    pub invalid_events: Counter<u64>,
}

impl Default for ImportMetrics {
    fn default() -> Self {
        let meter = backfill_observability::meter("import");
        Self {
            started: meter
                .u64_counter("backfill.imports.started")
                .with_description("imports admitted")
                .build(),
            rejected: meter
                .u64_counter("backfill.imports.rejected")
                .with_description("imports rejected by the concurrency limit")
                .build(),
            completed: meter
                .u64_counter("backfill.imports.completed")
                .with_description("imports that received their last batch")
                .build(),
            deleted: meter
                .u64_counter("backfill.imports.deleted")
                .with_description("completed imports deleted")
                .build(),
            imported_events: meter
                .u64_counter("backfill.events.imported")
                .with_unit("{event}")
                .with_description("events written to the event store")
                .build(),
            skipped_events: meter
                .u64_counter("backfill.events.skipped")
                .with_unit("{event}")
                .with_description("events outside the allowed date window")
                .build(),
            invalid_events: meter
                .u64_counter("backfill.events.invalid")
                .with_unit("{event}")
                .with_description("rows that could not be transformed")
                .build(),
        }
    }
}
