// Copyright 2022 SphereEx Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::time::Instant;

use once_cell::sync::Lazy;
use prometheus::{opts, HistogramOpts, HistogramVec, IntCounterVec, IntGaugeVec, Registry};

// LABEL_NAME_DOMAIN refers to the name of current mysql server
const LABEL_NAME_DOMAIN: &str = "domain";
// LABEL_NAME_TYPE refers to the type of current working command type
const LABEL_NAME_TYPE: &str = "type";

pub static COMMAND_PROCESSED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        opts!("mysql_command_processed_total", "The total of processed commands"),
        &[LABEL_NAME_DOMAIN, LABEL_NAME_TYPE],
    )
    .expect("Could not create COMMAND_PROCESSED_TOTAL")
});

pub static COMMAND_PROCESSED_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    let opt = HistogramOpts {
        common_opts: opts!("mysql_command_processed_duration", "The duration of processed commands"),
        buckets: Vec::<f64>::new(),
    };
    HistogramVec::new(opt, &[LABEL_NAME_DOMAIN, LABEL_NAME_TYPE])
        .expect("Could not create COMMAND_PROCESSED_DURATION")
});

pub static CONNECTIONS_ACTIVE: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        opts!("mysql_connections_active", "The client connections currently open"),
        &[LABEL_NAME_DOMAIN],
    )
    .expect("Could not create CONNECTIONS_ACTIVE")
});

/// Exposes the server metrics through a host registry.
pub fn register_metrics(registry: &Registry) -> Result<(), prometheus::Error> {
    registry.register(Box::new(COMMAND_PROCESSED_TOTAL.clone()))?;
    registry.register(Box::new(COMMAND_PROCESSED_DURATION.clone()))?;
    registry.register(Box::new(CONNECTIONS_ACTIVE.clone()))
}

#[derive(Debug, Clone)]
pub struct MySqlServerMetricsCollector {
    name: String,
}

impl MySqlServerMetricsCollector {
    pub fn new(name: &str) -> Self {
        MySqlServerMetricsCollector { name: name.to_string() }
    }

    pub fn set_command_processed_total(&self, command: &str) {
        COMMAND_PROCESSED_TOTAL.with_label_values(&[self.name.as_str(), command]).inc();
    }

    pub fn set_command_processed_duration(&self, command: &str, start: Instant) {
        COMMAND_PROCESSED_DURATION
            .with_label_values(&[self.name.as_str(), command])
            .observe(start.elapsed().as_secs_f64());
    }

    pub fn set_connections_active_inc(&self) {
        CONNECTIONS_ACTIVE.with_label_values(&[self.name.as_str()]).inc();
    }

    pub fn set_connections_active_dec(&self) {
        CONNECTIONS_ACTIVE.with_label_values(&[self.name.as_str()]).dec();
    }
}

#[cfg(test)]
mod test {
    use std::time::Instant;

    use prometheus::Registry;

    use super::*;

    #[test]
    fn test_collect() {
        let collector = MySqlServerMetricsCollector::new("metrics_test");
        collector.set_command_processed_total("query");
        collector.set_command_processed_total("query");
        collector.set_command_processed_duration("query", Instant::now());
        collector.set_connections_active_inc();
        collector.set_connections_active_inc();
        collector.set_connections_active_dec();

        assert_eq!(COMMAND_PROCESSED_TOTAL.with_label_values(&["metrics_test", "query"]).get(), 2);
        assert_eq!(CONNECTIONS_ACTIVE.with_label_values(&["metrics_test"]).get(), 1);
    }

    #[test]
    fn test_register_metrics() {
        let registry = Registry::new();
        register_metrics(&registry).unwrap();
        MySqlServerMetricsCollector::new("register_test").set_command_processed_total("ping");

        let names = registry.gather().iter().map(|m| m.get_name().to_string()).collect::<Vec<_>>();
        assert!(names.contains(&"mysql_command_processed_total".to_string()));

        // a second registration of the same collectors is rejected
        assert!(register_metrics(&registry).is_err());
    }
}
