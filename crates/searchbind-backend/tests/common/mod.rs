//! Common fixtures for searchbind-backend integration tests.

use std::sync::Arc;

use searchbind_backend::{LocalBackend, MockTransport, SearchBackend, ServiceBackend};
use searchbind_core::BackendSettings;
use searchbind_schema::{
    FieldDescriptor, FieldValue, MemorySource, RecordInstance, RecordType, SchemaRegistry,
};

/// The record type used across the integration suite: weighted search
/// fields, a filterable year, and a related author projection.
pub fn book_type() -> RecordType {
    RecordType::new("book")
        .with_field(FieldDescriptor::search("title").with_weight(2.0).with_autocomplete())
        .with_field(FieldDescriptor::search("body"))
        .with_field(FieldDescriptor::filter("year"))
        .with_field(FieldDescriptor::filter("genre"))
        .with_field(FieldDescriptor::related(
            "author",
            vec![
                FieldDescriptor::search("name"),
                FieldDescriptor::filter("country"),
            ],
        ))
}

pub fn registry() -> Arc<SchemaRegistry> {
    let mut registry = SchemaRegistry::new();
    registry.register(book_type()).expect("register book type");
    registry.register_subtype("novel", "book");
    Arc::new(registry)
}

pub fn book(
    id: &str,
    title: &str,
    body: &str,
    year: i64,
    genre: &str,
    author_name: &str,
    country: &str,
) -> RecordInstance {
    RecordInstance::new("book", id)
        .with_str("title", title)
        .with_str("body", body)
        .with_int("year", year)
        .with_str("genre", genre)
        .with(
            "author",
            FieldValue::Record(Box::new(
                RecordInstance::new("author", format!("a-{id}"))
                    .with_str("name", author_name)
                    .with_str("country", country),
            )),
        )
}

/// A small, varied corpus. Ids are "1".."6".
pub fn corpus() -> Vec<RecordInstance> {
    vec![
        book("1", "Dune", "Spice and sandworms on a desert planet", 1965, "sf", "Herbert", "US"),
        book("2", "Dune Messiah", "The desert planet after the jihad", 1969, "sf", "Herbert", "US"),
        book("3", "Solaris", "An ocean that thinks", 1961, "sf", "Lem", "PL"),
        book("4", "The Hobbit", "There and back again", 1937, "fantasy", "Tolkien", "UK"),
        book("5", "Hyperion", "Pilgrims tell their tales", 1989, "sf", "Simmons", "US"),
        book("6", "Roadside Picnic", "Stalkers in the zone", 1972, "sf", "Strugatsky", "RU"),
    ]
}

/// Both backends over the same source, fully indexed and refreshed.
pub struct Harness {
    pub source: Arc<MemorySource>,
    pub local: LocalBackend,
    pub service: ServiceBackend,
    pub transport: Arc<MockTransport>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_records(corpus())
    }

    pub fn with_records(records: Vec<RecordInstance>) -> Self {
        let source = Arc::new(MemorySource::new(vec![book_type()]));
        let local = LocalBackend::new(BackendSettings::default(), registry(), source.clone());
        let transport = Arc::new(MockTransport::new());
        let service = ServiceBackend::new(
            BackendSettings {
                backend: "service".into(),
                ..BackendSettings::default()
            },
            registry(),
            source.clone(),
            transport.clone(),
        )
        .expect("service backend");

        for record in records {
            source.insert(record.clone());
            local.add(&record).expect("index on local");
            service.add(&record).expect("index on service");
        }

        Self {
            source,
            local,
            service,
            transport,
        }
    }

    pub fn backends(&self) -> [&dyn SearchBackend; 2] {
        [&self.local, &self.service]
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}
