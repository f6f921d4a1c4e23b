//! Sample fisheries domain.
//!
//! A small but representative model: controlled-vocabulary referentials under
//! a common interface, a vessel/owner reference cycle, ordered collections of
//! scalars and references, a many-to-one link into a reference table, a
//! derived accessor and a nested type. Used by the CLI, the integration tests
//! and the benchmarks.

use std::any::Any;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use crate::domain::{
    DomainType, ElementKind, Entity, FieldKind, FromValue, ObjectGraph, ObjectId, ScalarType,
    TypeDescriptor, Value, descriptor_of, unknown_field,
};
use crate::error::{ConfigError, FieldError};
use crate::registry::TypeRegistry;

/// Default model namespace of the catalog.
pub const NAMESPACE: &str = "https://owlmap.dev/model";

pub const REFERENTIAL: &str = "fisheries.referential.Referential";
pub const COUNTRY: &str = "fisheries.referential.Country";
pub const LOCATION: &str = "fisheries.referential.Location";
pub const SPECIES: &str = "fisheries.referential.Species";
pub const PERSON: &str = "fisheries.data.Person";
pub const VESSEL: &str = "fisheries.data.Vessel";
pub const TRIP: &str = "fisheries.data.Trip";
pub const TRIP_LEG: &str = "fisheries.data.Trip.Leg";
pub const ACTIVITY: &str = "fisheries.data.Activity";

/// Registry with every catalog type, the referential interface included.
pub fn registry(namespace: &str) -> Result<TypeRegistry, ConfigError> {
    TypeRegistry::builder(namespace)
        .register_descriptor(Arc::new(referential()))
        .register::<Country>()
        .register::<Location>()
        .register::<Species>()
        .register::<Person>()
        .register::<Vessel>()
        .register::<Trip>()
        .register::<TripLeg>()
        .register::<Activity>()
        .build()
}

/// The `Referential` interface shared by controlled vocabularies.
pub fn referential() -> TypeDescriptor {
    TypeDescriptor::interface(REFERENTIAL)
        .scalar("code", ScalarType::String)
        .scalar("label", ScalarType::String)
        .build()
}

fn assign<T: FromValue>(slot: &mut Option<T>, field: &str, value: Value) -> Result<(), FieldError> {
    *slot = Some(value.extract(field)?);
    Ok(())
}

fn list<T: Clone + Into<Value>>(items: &[T]) -> Option<Value> {
    Some(Value::from(items.to_vec()))
}

// ---------------------------------------------------------------------------
// Referentials
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Country {
    pub id: Option<i64>,
    pub code: Option<String>,
    pub label: Option<String>,
}

impl Country {
    pub fn new(id: i64, code: &str, label: &str) -> Self {
        Self {
            id: Some(id),
            code: Some(code.into()),
            label: Some(label.into()),
        }
    }
}

impl DomainType for Country {
    fn describe() -> TypeDescriptor {
        TypeDescriptor::builder::<Self>(COUNTRY)
            .supertype(REFERENTIAL)
            .identifier("id", ScalarType::Long)
            .scalar("code", ScalarType::String)
            .scalar("label", ScalarType::String)
            .build()
    }
}

impl Entity for Country {
    fn descriptor(&self) -> Arc<TypeDescriptor> {
        descriptor_of::<Self>()
    }

    fn get(&self, field: &str) -> Option<Value> {
        match field {
            "id" => self.id.map(Value::from),
            "code" => self.code.clone().map(Value::from),
            "label" => self.label.clone().map(Value::from),
            _ => None,
        }
    }

    fn set(&mut self, field: &str, value: Value) -> Result<(), FieldError> {
        match field {
            "id" => assign(&mut self.id, field, value),
            "code" => assign(&mut self.code, field, value),
            "label" => assign(&mut self.label, field, value),
            _ => Err(unknown_field(self, field)),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Location {
    pub id: Option<i64>,
    pub code: Option<String>,
    pub label: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl Location {
    pub fn with_id(id: i64) -> Self {
        Self {
            id: Some(id),
            ..Self::default()
        }
    }

    pub fn port(id: i64, code: &str, label: &str, latitude: f64, longitude: f64) -> Self {
        Self {
            id: Some(id),
            code: Some(code.into()),
            label: Some(label.into()),
            latitude: Some(latitude),
            longitude: Some(longitude),
        }
    }
}

impl DomainType for Location {
    fn describe() -> TypeDescriptor {
        TypeDescriptor::builder::<Self>(LOCATION)
            .supertype(REFERENTIAL)
            .identifier("id", ScalarType::Long)
            .scalar("code", ScalarType::String)
            .scalar("label", ScalarType::String)
            .scalar("latitude", ScalarType::Double)
            .scalar("longitude", ScalarType::Double)
            .build()
    }
}

impl Entity for Location {
    fn descriptor(&self) -> Arc<TypeDescriptor> {
        descriptor_of::<Self>()
    }

    fn get(&self, field: &str) -> Option<Value> {
        match field {
            "id" => self.id.map(Value::from),
            "code" => self.code.clone().map(Value::from),
            "label" => self.label.clone().map(Value::from),
            "latitude" => self.latitude.map(Value::from),
            "longitude" => self.longitude.map(Value::from),
            _ => None,
        }
    }

    fn set(&mut self, field: &str, value: Value) -> Result<(), FieldError> {
        match field {
            "id" => assign(&mut self.id, field, value),
            "code" => assign(&mut self.code, field, value),
            "label" => assign(&mut self.label, field, value),
            "latitude" => assign(&mut self.latitude, field, value),
            "longitude" => assign(&mut self.longitude, field, value),
            _ => Err(unknown_field(self, field)),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Species {
    pub id: Option<i64>,
    pub code: Option<String>,
    pub label: Option<String>,
    pub scientific_name: Option<String>,
}

impl Species {
    pub fn new(id: i64, code: &str, label: &str, scientific_name: &str) -> Self {
        Self {
            id: Some(id),
            code: Some(code.into()),
            label: Some(label.into()),
            scientific_name: Some(scientific_name.into()),
        }
    }
}

impl DomainType for Species {
    fn describe() -> TypeDescriptor {
        TypeDescriptor::builder::<Self>(SPECIES)
            .supertype(REFERENTIAL)
            .identifier("id", ScalarType::Long)
            .scalar("code", ScalarType::String)
            .scalar("label", ScalarType::String)
            .scalar("scientificName", ScalarType::String)
            .build()
    }
}

impl Entity for Species {
    fn descriptor(&self) -> Arc<TypeDescriptor> {
        descriptor_of::<Self>()
    }

    fn get(&self, field: &str) -> Option<Value> {
        match field {
            "id" => self.id.map(Value::from),
            "code" => self.code.clone().map(Value::from),
            "label" => self.label.clone().map(Value::from),
            "scientificName" => self.scientific_name.clone().map(Value::from),
            _ => None,
        }
    }

    fn set(&mut self, field: &str, value: Value) -> Result<(), FieldError> {
        match field {
            "id" => assign(&mut self.id, field, value),
            "code" => assign(&mut self.code, field, value),
            "label" => assign(&mut self.label, field, value),
            "scientificName" => assign(&mut self.scientific_name, field, value),
            _ => Err(unknown_field(self, field)),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

// ---------------------------------------------------------------------------
// Data
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Person {
    pub id: Option<i64>,
    pub name: Option<String>,
    pub birth_date: Option<NaiveDate>,
    /// Vessel this person skippers; closes the vessel/owner cycle.
    pub vessel: Option<ObjectId>,
}

impl Person {
    pub fn new(id: i64, name: &str) -> Self {
        Self {
            id: Some(id),
            name: Some(name.into()),
            ..Self::default()
        }
    }
}

impl DomainType for Person {
    fn describe() -> TypeDescriptor {
        TypeDescriptor::builder::<Self>(PERSON)
            .identifier("id", ScalarType::Long)
            .scalar("name", ScalarType::String)
            .scalar("birthDate", ScalarType::Date)
            .reference("vessel", VESSEL)
            .build()
    }
}

impl Entity for Person {
    fn descriptor(&self) -> Arc<TypeDescriptor> {
        descriptor_of::<Self>()
    }

    fn get(&self, field: &str) -> Option<Value> {
        match field {
            "id" => self.id.map(Value::from),
            "name" => self.name.clone().map(Value::from),
            "birthDate" => self.birth_date.map(Value::from),
            "vessel" => self.vessel.map(Value::from),
            _ => None,
        }
    }

    fn set(&mut self, field: &str, value: Value) -> Result<(), FieldError> {
        match field {
            "id" => assign(&mut self.id, field, value),
            "name" => assign(&mut self.name, field, value),
            "birthDate" => assign(&mut self.birth_date, field, value),
            "vessel" => assign(&mut self.vessel, field, value),
            _ => Err(unknown_field(self, field)),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Vessel {
    pub id: Option<i64>,
    pub name: Option<String>,
    pub length: Option<f32>,
    pub active: Option<bool>,
    pub commissioned: Option<NaiveDate>,
    pub owner: Option<ObjectId>,
    pub base_port_location: Option<ObjectId>,
    /// Many-to-one into the country table.
    pub flag_country: Option<ObjectId>,
    pub former_names: Vec<String>,
}

impl Vessel {
    pub fn new(id: i64, name: &str) -> Self {
        Self {
            id: Some(id),
            name: Some(name.into()),
            ..Self::default()
        }
    }

    /// `name (id)`, exposed as the derived `displayName` accessor.
    pub fn display_name(&self) -> Option<String> {
        match (&self.name, self.id) {
            (Some(name), Some(id)) => Some(format!("{name} ({id})")),
            (Some(name), None) => Some(name.clone()),
            _ => None,
        }
    }
}

impl DomainType for Vessel {
    fn describe() -> TypeDescriptor {
        TypeDescriptor::builder::<Self>(VESSEL)
            .identifier("id", ScalarType::Long)
            .scalar("name", ScalarType::String)
            .scalar("length", ScalarType::Float)
            .scalar("active", ScalarType::Boolean)
            .scalar("commissioned", ScalarType::Date)
            .reference("owner", PERSON)
            .reference("basePortLocation", LOCATION)
            .many_to_one("flagCountry", COUNTRY)
            .collection("formerNames", ElementKind::Scalar(ScalarType::String))
            .derived("displayName", FieldKind::Scalar(ScalarType::String))
            .build()
    }
}

impl Entity for Vessel {
    fn descriptor(&self) -> Arc<TypeDescriptor> {
        descriptor_of::<Self>()
    }

    fn get(&self, field: &str) -> Option<Value> {
        match field {
            "id" => self.id.map(Value::from),
            "name" => self.name.clone().map(Value::from),
            "length" => self.length.map(Value::from),
            "active" => self.active.map(Value::from),
            "commissioned" => self.commissioned.map(Value::from),
            "owner" => self.owner.map(Value::from),
            "basePortLocation" => self.base_port_location.map(Value::from),
            "flagCountry" => self.flag_country.map(Value::from),
            "formerNames" => list(&self.former_names),
            "displayName" => self.display_name().map(Value::from),
            _ => None,
        }
    }

    fn set(&mut self, field: &str, value: Value) -> Result<(), FieldError> {
        match field {
            "id" => assign(&mut self.id, field, value),
            "name" => assign(&mut self.name, field, value),
            "length" => assign(&mut self.length, field, value),
            "active" => assign(&mut self.active, field, value),
            "commissioned" => assign(&mut self.commissioned, field, value),
            "owner" => assign(&mut self.owner, field, value),
            "basePortLocation" => assign(&mut self.base_port_location, field, value),
            "flagCountry" => assign(&mut self.flag_country, field, value),
            "formerNames" => {
                self.former_names = value.extract(field)?;
                Ok(())
            }
            _ => Err(unknown_field(self, field)),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// One leg of a trip; a nested type that never becomes a class.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TripLeg {
    pub sequence: Option<i32>,
}

impl DomainType for TripLeg {
    fn describe() -> TypeDescriptor {
        TypeDescriptor::builder::<Self>(TRIP_LEG)
            .nested()
            .scalar("sequence", ScalarType::Int)
            .build()
    }
}

impl Entity for TripLeg {
    fn descriptor(&self) -> Arc<TypeDescriptor> {
        descriptor_of::<Self>()
    }

    fn get(&self, field: &str) -> Option<Value> {
        match field {
            "sequence" => self.sequence.map(Value::from),
            _ => None,
        }
    }

    fn set(&mut self, field: &str, value: Value) -> Result<(), FieldError> {
        match field {
            "sequence" => assign(&mut self.sequence, field, value),
            _ => Err(unknown_field(self, field)),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Trip {
    pub id: Option<i64>,
    pub departure: Option<NaiveDateTime>,
    pub vessel: Option<ObjectId>,
    pub ports: Vec<ObjectId>,
    pub activities: Vec<ObjectId>,
    pub current_leg: Option<ObjectId>,
}

impl DomainType for Trip {
    fn describe() -> TypeDescriptor {
        TypeDescriptor::builder::<Self>(TRIP)
            .identifier("id", ScalarType::Long)
            .scalar("departure", ScalarType::DateTime)
            .reference("vessel", VESSEL)
            .collection("ports", ElementKind::Reference(LOCATION.into()))
            .collection("activities", ElementKind::Reference(ACTIVITY.into()))
            .reference("currentLeg", TRIP_LEG)
            .build()
    }
}

impl Entity for Trip {
    fn descriptor(&self) -> Arc<TypeDescriptor> {
        descriptor_of::<Self>()
    }

    fn get(&self, field: &str) -> Option<Value> {
        match field {
            "id" => self.id.map(Value::from),
            "departure" => self.departure.map(Value::from),
            "vessel" => self.vessel.map(Value::from),
            "ports" => list(&self.ports),
            "activities" => list(&self.activities),
            "currentLeg" => self.current_leg.map(Value::from),
            _ => None,
        }
    }

    fn set(&mut self, field: &str, value: Value) -> Result<(), FieldError> {
        match field {
            "id" => assign(&mut self.id, field, value),
            "departure" => assign(&mut self.departure, field, value),
            "vessel" => assign(&mut self.vessel, field, value),
            "ports" => {
                self.ports = value.extract(field)?;
                Ok(())
            }
            "activities" => {
                self.activities = value.extract(field)?;
                Ok(())
            }
            "currentLeg" => assign(&mut self.current_leg, field, value),
            _ => Err(unknown_field(self, field)),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Activity {
    pub id: Option<i64>,
    pub date: Option<NaiveDate>,
    pub start_time: Option<NaiveTime>,
    pub catch_weight: Option<f32>,
    pub set_count: Option<i32>,
    pub species: Option<ObjectId>,
}

impl DomainType for Activity {
    fn describe() -> TypeDescriptor {
        TypeDescriptor::builder::<Self>(ACTIVITY)
            .identifier("id", ScalarType::Long)
            .scalar("date", ScalarType::Date)
            .scalar("startTime", ScalarType::Time)
            .scalar("catchWeight", ScalarType::Float)
            .scalar("setCount", ScalarType::Int)
            .reference("species", SPECIES)
            .build()
    }
}

impl Entity for Activity {
    fn descriptor(&self) -> Arc<TypeDescriptor> {
        descriptor_of::<Self>()
    }

    fn get(&self, field: &str) -> Option<Value> {
        match field {
            "id" => self.id.map(Value::from),
            "date" => self.date.map(Value::from),
            "startTime" => self.start_time.map(Value::from),
            "catchWeight" => self.catch_weight.map(Value::from),
            "setCount" => self.set_count.map(Value::from),
            "species" => self.species.map(Value::from),
            _ => None,
        }
    }

    fn set(&mut self, field: &str, value: Value) -> Result<(), FieldError> {
        match field {
            "id" => assign(&mut self.id, field, value),
            "date" => assign(&mut self.date, field, value),
            "startTime" => assign(&mut self.start_time, field, value),
            "catchWeight" => assign(&mut self.catch_weight, field, value),
            "setCount" => assign(&mut self.set_count, field, value),
            "species" => assign(&mut self.species, field, value),
            _ => Err(unknown_field(self, field)),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

// ---------------------------------------------------------------------------
// Sample data
// ---------------------------------------------------------------------------

/// A small fleet: `vessels` vessels, each with an owner, a home port, a flag,
/// and one trip with two activities.
///
/// Returns the graph and the trip roots.
pub fn sample_fleet(vessels: usize) -> (ObjectGraph, Vec<ObjectId>) {
    let mut objects = ObjectGraph::new();
    let france = objects.add(Country::new(250, "FRA", "France"));
    let ports = [
        objects.add(Location::port(10, "FRCOC", "Concarneau", 47.87, -3.92)),
        objects.add(Location::port(11, "FRLRT", "Lorient", 47.75, -3.37)),
    ];
    let hake = objects.add(Species::new(100, "HKE", "Hake", "Merluccius merluccius"));
    let sole = objects.add(Species::new(101, "SOL", "Common sole", "Solea solea"));

    let start = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap_or_default();
    let mut trips = Vec::with_capacity(vessels);
    for i in 0..vessels {
        let n = i as i64 + 1;
        let vessel = objects.add(Vessel {
            length: Some(12.5 + i as f32),
            active: Some(i % 3 != 0),
            commissioned: NaiveDate::from_ymd_opt(1990 + (i % 30) as i32, 6, 1),
            base_port_location: Some(ports[i % ports.len()]),
            flag_country: Some(france),
            former_names: if i % 2 == 0 {
                vec![format!("Ar Mor {n}")]
            } else {
                Vec::new()
            },
            ..Vessel::new(n, &format!("Navire {n}"))
        });
        let owner = objects.add(Person {
            birth_date: NaiveDate::from_ymd_opt(1970 + (i % 25) as i32, 1, 15),
            vessel: Some(vessel),
            ..Person::new(1000 + n, &format!("Skipper {n}"))
        });
        if let Some(entity) = objects.get_as_mut::<Vessel>(vessel) {
            entity.owner = Some(owner);
        }

        let date = start + chrono::Days::new(i as u64);
        let activities = [(hake, 320.5), (sole, 41.0)]
            .into_iter()
            .enumerate()
            .map(|(k, (species, weight))| {
                objects.add(Activity {
                    id: Some(n * 10 + k as i64),
                    date: Some(date),
                    start_time: NaiveTime::from_hms_opt(5 + k as u32, 30, 0),
                    catch_weight: Some(weight),
                    set_count: Some(k as i32 + 1),
                    species: Some(species),
                })
            })
            .collect();
        trips.push(objects.add(Trip {
            id: Some(n),
            departure: date.and_hms_opt(4, 0, 0),
            vessel: Some(vessel),
            ports: ports.to_vec(),
            activities,
            current_leg: None,
        }));
    }
    (objects, trips)
}
