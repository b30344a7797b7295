//! Shared fixture models for the integration suite.
//!
//! Metadata is declared the way application code declares it: `const` field,
//! relation, and rule tables plus hand-written `Model` conversions.

#![allow(dead_code)]

use serde::{Deserialize, Serialize};
use std::future::Future;

pub use nestmodel_mem::{MemEngine, TableSpec};

use nestmodel::{
    Cascade, Check, Error, FieldInfo, FieldRule, LinkTableInfo, Model, ModelMeta, Outcome,
    Record, RelationInfo, RelationKind, Result, Stamp, Value,
};

/// Run a future on a fresh single-threaded runtime.
pub fn run_test<F: Future>(future: F) -> F::Output {
    let rt = asupersync::runtime::RuntimeBuilder::current_thread()
        .build()
        .expect("create asupersync runtime");
    rt.block_on(future)
}

/// Unwrap an `Outcome`, panicking on anything but `Ok`.
pub fn unwrap_outcome<T: std::fmt::Debug>(outcome: Outcome<T, Error>) -> T {
    match outcome {
        Outcome::Ok(v) => v,
        other => std::panic::panic_any(format!("unexpected outcome: {other:?}")),
    }
}

/// An engine with every fixture model registered.
pub fn engine() -> MemEngine {
    let engine = MemEngine::new();
    engine.register_model(&COUNTRY_META);
    engine.register_model(&ADDRESS_META);
    engine.register_model(&ORDER_META);
    engine.register_model(&TAG_META);
    engine.register_model(&CUSTOMER_META);
    engine.register_model(&LANDMARK_META);
    engine
}

fn text(record: &Record, field: &str) -> Option<String> {
    record
        .scalar(field)
        .and_then(Value::as_str)
        .map(ToString::to_string)
}

fn integer(record: &Record, field: &str) -> Option<i64> {
    record.scalar(field).and_then(Value::as_i64)
}

// ============================================================================
// Country
// ============================================================================

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Country {
    pub id: Option<i64>,
    pub name: Option<String>,
    pub country_code: Option<String>,
    pub locale: Option<String>,
}

pub static COUNTRY_META: ModelMeta = ModelMeta {
    table: "countries",
    primary_key: "id",
    fields: &[
        FieldInfo::new("id").primary_key(true).auto_increment(true),
        FieldInfo::new("name"),
        FieldInfo::new("country_code").unique(true),
        FieldInfo::new("locale").nullable(true),
    ],
    relations: &[],
    rules: &[
        FieldRule::new("name", &[Check::Required]),
        FieldRule::new(
            "country_code",
            &[Check::Required, Check::Pattern("^[a-z]{2}$")],
        ),
    ],
};

impl Model for Country {
    fn meta() -> &'static ModelMeta {
        &COUNTRY_META
    }

    fn to_record(&self) -> Record {
        let mut record = Record::new(&COUNTRY_META);
        if let Some(id) = self.id {
            record.set_scalar("id", id);
        }
        if let Some(name) = &self.name {
            record.set_scalar("name", name.clone());
        }
        if let Some(code) = &self.country_code {
            record.set_scalar("country_code", code.clone());
        }
        if let Some(locale) = &self.locale {
            record.set_scalar("locale", locale.clone());
        }
        record
    }

    fn from_record(record: &Record) -> Result<Self> {
        Ok(Self {
            id: integer(record, "id"),
            name: text(record, "name"),
            country_code: text(record, "country_code"),
            locale: text(record, "locale"),
        })
    }

    fn primary_key(&self) -> Value {
        self.id.map_or(Value::Null, Value::BigInt)
    }
}

impl Country {
    pub fn new(name: &str, code: &str, locale: &str) -> Self {
        Self {
            id: None,
            name: Some(name.to_string()),
            country_code: Some(code.to_string()),
            locale: Some(locale.to_string()),
        }
    }
}

// ============================================================================
// Customer graph: address (one-to-one), orders (one-to-many), tags
// (many-to-many, no delete cascade)
// ============================================================================

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Address {
    pub id: Option<i64>,
    pub street: Option<String>,
    pub customer_id: Option<i64>,
}

pub static ADDRESS_META: ModelMeta = ModelMeta {
    table: "addresses",
    primary_key: "id",
    fields: &[
        FieldInfo::new("id").primary_key(true).auto_increment(true),
        FieldInfo::new("street"),
        FieldInfo::new("customer_id").nullable(true),
    ],
    relations: &[],
    rules: &[FieldRule::new("street", &[Check::Required])],
};

impl Model for Address {
    fn meta() -> &'static ModelMeta {
        &ADDRESS_META
    }

    fn to_record(&self) -> Record {
        let mut record = Record::new(&ADDRESS_META);
        if let Some(id) = self.id {
            record.set_scalar("id", id);
        }
        if let Some(street) = &self.street {
            record.set_scalar("street", street.clone());
        }
        if let Some(customer_id) = self.customer_id {
            record.set_scalar("customer_id", customer_id);
        }
        record
    }

    fn from_record(record: &Record) -> Result<Self> {
        Ok(Self {
            id: integer(record, "id"),
            street: text(record, "street"),
            customer_id: integer(record, "customer_id"),
        })
    }

    fn primary_key(&self) -> Value {
        self.id.map_or(Value::Null, Value::BigInt)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Order {
    pub id: Option<i64>,
    pub item: Option<String>,
    pub quantity: Option<i64>,
    pub customer_id: Option<i64>,
}

pub static ORDER_META: ModelMeta = ModelMeta {
    table: "orders",
    primary_key: "id",
    fields: &[
        FieldInfo::new("id").primary_key(true).auto_increment(true),
        FieldInfo::new("item"),
        FieldInfo::new("quantity").nullable(true),
        FieldInfo::new("customer_id").nullable(true),
    ],
    relations: &[],
    rules: &[
        FieldRule::new("item", &[Check::Required]),
        FieldRule::new("quantity", &[Check::Min(1.0)]),
    ],
};

impl Model for Order {
    fn meta() -> &'static ModelMeta {
        &ORDER_META
    }

    fn to_record(&self) -> Record {
        let mut record = Record::new(&ORDER_META);
        if let Some(id) = self.id {
            record.set_scalar("id", id);
        }
        if let Some(item) = &self.item {
            record.set_scalar("item", item.clone());
        }
        if let Some(quantity) = self.quantity {
            record.set_scalar("quantity", quantity);
        }
        if let Some(customer_id) = self.customer_id {
            record.set_scalar("customer_id", customer_id);
        }
        record
    }

    fn from_record(record: &Record) -> Result<Self> {
        Ok(Self {
            id: integer(record, "id"),
            item: text(record, "item"),
            quantity: integer(record, "quantity"),
            customer_id: integer(record, "customer_id"),
        })
    }

    fn primary_key(&self) -> Value {
        self.id.map_or(Value::Null, Value::BigInt)
    }
}

impl Order {
    pub fn new(item: &str, quantity: i64) -> Self {
        Self {
            id: None,
            item: Some(item.to_string()),
            quantity: Some(quantity),
            customer_id: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Tag {
    pub id: Option<i64>,
    pub label: Option<String>,
}

pub static TAG_META: ModelMeta = ModelMeta {
    table: "tags",
    primary_key: "id",
    fields: &[
        FieldInfo::new("id").primary_key(true).auto_increment(true),
        FieldInfo::new("label").unique(true),
    ],
    relations: &[],
    rules: &[FieldRule::new("label", &[Check::Required])],
};

impl Model for Tag {
    fn meta() -> &'static ModelMeta {
        &TAG_META
    }

    fn to_record(&self) -> Record {
        let mut record = Record::new(&TAG_META);
        if let Some(id) = self.id {
            record.set_scalar("id", id);
        }
        if let Some(label) = &self.label {
            record.set_scalar("label", label.clone());
        }
        record
    }

    fn from_record(record: &Record) -> Result<Self> {
        Ok(Self {
            id: integer(record, "id"),
            label: text(record, "label"),
        })
    }

    fn primary_key(&self) -> Value {
        self.id.map_or(Value::Null, Value::BigInt)
    }
}

impl Tag {
    pub fn new(label: &str) -> Self {
        Self {
            id: None,
            label: Some(label.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Customer {
    pub id: Option<i64>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub created_at: Option<i64>,
    pub updated_at: Option<i64>,
    pub address: Option<Address>,
    pub orders: Vec<Order>,
    pub tags: Vec<Tag>,
}

pub static CUSTOMER_META: ModelMeta = ModelMeta {
    table: "customers",
    primary_key: "id",
    fields: &[
        FieldInfo::new("id").primary_key(true).auto_increment(true),
        FieldInfo::new("name"),
        FieldInfo::new("email").nullable(true),
        FieldInfo::new("created_at").nullable(true).stamp(Stamp::CreatedAt),
        FieldInfo::new("updated_at").nullable(true).stamp(Stamp::UpdatedAt),
    ],
    relations: &[
        RelationInfo::new("address", RelationKind::OneToOne, || &ADDRESS_META)
            .remote_key("customer_id"),
        RelationInfo::new("orders", RelationKind::OneToMany, || &ORDER_META)
            .remote_key("customer_id"),
        RelationInfo::new("tags", RelationKind::ManyToMany, || &TAG_META)
            .link_table(LinkTableInfo::new("customer_tags", "customer_id", "tag_id"))
            .delete_cascade(Cascade::None),
    ],
    rules: &[
        FieldRule::new("name", &[Check::Required]),
        FieldRule::new("email", &[Check::Pattern("^[^@]+@[^@]+$")]),
    ],
};

impl Model for Customer {
    fn meta() -> &'static ModelMeta {
        &CUSTOMER_META
    }

    fn to_record(&self) -> Record {
        let mut record = Record::new(&CUSTOMER_META);
        if let Some(id) = self.id {
            record.set_scalar("id", id);
        }
        if let Some(name) = &self.name {
            record.set_scalar("name", name.clone());
        }
        if let Some(email) = &self.email {
            record.set_scalar("email", email.clone());
        }
        if let Some(created_at) = self.created_at {
            record.set_scalar("created_at", Value::Timestamp(created_at));
        }
        if let Some(updated_at) = self.updated_at {
            record.set_scalar("updated_at", Value::Timestamp(updated_at));
        }
        if let Some(address) = &self.address {
            record.set_one("address", address.to_record());
        }
        if !self.orders.is_empty() {
            record.set_many("orders", self.orders.iter().map(Model::to_record).collect());
        }
        if !self.tags.is_empty() {
            record.set_many("tags", self.tags.iter().map(Model::to_record).collect());
        }
        record
    }

    fn from_record(record: &Record) -> Result<Self> {
        let address = record
            .one("address")
            .map(Address::from_record)
            .transpose()?;
        let orders = record
            .many("orders")
            .unwrap_or(&[])
            .iter()
            .map(Order::from_record)
            .collect::<Result<Vec<_>>>()?;
        let tags = record
            .many("tags")
            .unwrap_or(&[])
            .iter()
            .map(Tag::from_record)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            id: integer(record, "id"),
            name: text(record, "name"),
            email: text(record, "email"),
            created_at: integer(record, "created_at"),
            updated_at: integer(record, "updated_at"),
            address,
            orders,
            tags,
        })
    }

    fn primary_key(&self) -> Value {
        self.id.map_or(Value::Null, Value::BigInt)
    }
}

// ============================================================================
// Landmark: a reference-only relation (no cascades)
// ============================================================================

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Landmark {
    pub id: Option<i64>,
    pub title: Option<String>,
    pub country_id: Option<i64>,
    pub country: Option<Country>,
}

pub static LANDMARK_META: ModelMeta = ModelMeta {
    table: "landmarks",
    primary_key: "id",
    fields: &[
        FieldInfo::new("id").primary_key(true).auto_increment(true),
        FieldInfo::new("title"),
        FieldInfo::new("country_id").nullable(true),
    ],
    relations: &[RelationInfo::new("country", RelationKind::OneToOne, || &COUNTRY_META)
        .local_key("country_id")
        .write_cascade(Cascade::None)
        .delete_cascade(Cascade::None)],
    rules: &[FieldRule::new("title", &[Check::Required])],
};

impl Model for Landmark {
    fn meta() -> &'static ModelMeta {
        &LANDMARK_META
    }

    fn to_record(&self) -> Record {
        let mut record = Record::new(&LANDMARK_META);
        if let Some(id) = self.id {
            record.set_scalar("id", id);
        }
        if let Some(title) = &self.title {
            record.set_scalar("title", title.clone());
        }
        if let Some(country_id) = self.country_id {
            record.set_scalar("country_id", country_id);
        }
        if let Some(country) = &self.country {
            record.set_one("country", country.to_record());
        }
        record
    }

    fn from_record(record: &Record) -> Result<Self> {
        let country = record
            .one("country")
            .map(Country::from_record)
            .transpose()?;
        Ok(Self {
            id: integer(record, "id"),
            title: text(record, "title"),
            country_id: integer(record, "country_id"),
            country,
        })
    }

    fn primary_key(&self) -> Value {
        self.id.map_or(Value::Null, Value::BigInt)
    }
}
