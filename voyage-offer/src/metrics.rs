use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

/// Counters for the retrieval engine, exported in Prometheus text format.
#[derive(Clone)]
pub struct EngineMetrics {
    registry: Registry,
    pub events_appended: IntCounterVec,
    pub materializations: IntCounterVec,
    pub materialized_rows: IntCounter,
    pub pages_served: IntCounter,
    pub page_rows: IntCounter,
}

impl EngineMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("voyage".to_string()), None)?;

        let events_appended = IntCounterVec::new(
            Opts::new("events_appended_total", "Events appended to user logs, by kind"),
            &["kind"],
        )?;
        let materializations = IntCounterVec::new(
            Opts::new("materializations_total", "Offer set rebuilds, by outcome"),
            &["outcome"],
        )?;
        let materialized_rows = IntCounter::with_opts(Opts::new(
            "materialized_rows_total",
            "Rows written into user offer sets",
        ))?;
        let pages_served = IntCounter::with_opts(Opts::new("pages_served_total", "Pages returned"))?;
        let page_rows = IntCounter::with_opts(Opts::new("page_rows_total", "Rows returned in pages"))?;

        registry.register(Box::new(events_appended.clone()))?;
        registry.register(Box::new(materializations.clone()))?;
        registry.register(Box::new(materialized_rows.clone()))?;
        registry.register(Box::new(pages_served.clone()))?;
        registry.register(Box::new(page_rows.clone()))?;

        Ok(Self {
            registry,
            events_appended,
            materializations,
            materialized_rows,
            pages_served,
            page_rows,
        })
    }

    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_includes_prefixed_counters() {
        let metrics = EngineMetrics::new().unwrap();
        metrics.events_appended.with_label_values(&["PARAM"]).inc();
        metrics.pages_served.inc();

        let text = metrics.render().unwrap();
        assert!(text.contains("voyage_events_appended_total{kind=\"PARAM\"} 1"));
        assert!(text.contains("voyage_pages_served_total 1"));
    }
}
