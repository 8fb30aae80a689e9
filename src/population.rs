/*!

Households, facilities and the people who move between them.

All of it lives in one data plugin on the [`Context`]. People, households and facilities are
stored in insertion order and addressed by index ([`PersonId`], [`LocationId`]); the ids used
in population and movement files are kept in lookup tables. Each location keeps an ordered
occupant list, and every person is an occupant of exactly the location its `location` field
names. [`ContextPopulationExt::move_person`] is the only way to change either side.

*/

use std::collections::BTreeMap;
use std::fmt::{self, Display};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::context::Context;
use crate::error::EpiError;
use crate::hashing::HashMap;
use crate::log::{debug, trace};
use crate::people::{Person, PersonId, Sex};
use crate::New;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LocationId {
    Household(usize),
    Facility(usize),
}

impl Display for LocationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocationId::Household(index) => write!(f, "household #{index}"),
            LocationId::Facility(index) => write!(f, "facility #{index}"),
        }
    }
}

/// A household or facility and the people currently in it.
#[derive(Clone, Debug, PartialEq)]
pub struct Location {
    pub id: LocationId,
    /// The id used in population and movement files.
    pub label: String,
    pub name: Option<String>,
    /// Maximum occupancy. Households and unlimited facilities have none.
    pub capacity: Option<usize>,
    occupants: Vec<PersonId>,
}

impl Location {
    fn new(id: LocationId, label: &str, capacity: Option<usize>) -> Self {
        Location {
            id,
            label: label.to_string(),
            name: None,
            capacity,
            occupants: Vec::new(),
        }
    }

    #[must_use]
    pub fn occupants(&self) -> &[PersonId] {
        &self.occupants
    }

    #[must_use]
    pub fn occupancy(&self) -> usize {
        self.occupants.len()
    }

    #[must_use]
    pub fn contains(&self, person: PersonId) -> bool {
        self.occupants.contains(&person)
    }

    fn add(&mut self, person: PersonId) {
        if !self.contains(person) {
            self.occupants.push(person);
        }
    }

    fn remove(&mut self, person: PersonId) {
        self.occupants.retain(|&occupant| occupant != person);
    }
}

#[derive(Default)]
struct PopulationData {
    people: Vec<Person>,
    households: Vec<Location>,
    facilities: Vec<Location>,
    person_ids: HashMap<String, PersonId>,
    household_ids: HashMap<String, LocationId>,
    facility_ids: HashMap<String, LocationId>,
}

impl New for PopulationData {
    #[allow(non_upper_case_globals)]
    const new: &'static dyn Fn() -> Self = &|| PopulationData::default();
}

impl PopulationData {
    fn location(&self, id: LocationId) -> Option<&Location> {
        match id {
            LocationId::Household(index) => self.households.get(index),
            LocationId::Facility(index) => self.facilities.get(index),
        }
    }

    fn location_mut(&mut self, id: LocationId) -> Option<&mut Location> {
        match id {
            LocationId::Household(index) => self.households.get_mut(index),
            LocationId::Facility(index) => self.facilities.get_mut(index),
        }
    }
}

/// A person as listed in a population file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PersonRecord {
    #[serde(default)]
    pub sex: Sex,
    pub age: u8,
    /// The id of the person's household.
    pub home: String,
}

/// A facility as listed in a population file. A negative or missing capacity means unlimited.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FacilityRecord {
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub capacity: Option<i64>,
}

/// The people, households and facilities of one simulated area, keyed by their file ids.
/// Household values carry no data the engine uses.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PopulationFile {
    #[serde(default)]
    pub people: BTreeMap<String, PersonRecord>,
    #[serde(default)]
    pub homes: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub places: BTreeMap<String, FacilityRecord>,
}

impl PopulationFile {
    pub fn from_json_str(json: &str) -> Result<Self, EpiError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, EpiError> {
        let file = std::fs::File::open(path)?;
        Ok(serde_json::from_reader(std::io::BufReader::new(file))?)
    }
}

fn unknown_person(id: PersonId) -> EpiError {
    EpiError::UnknownPerson(id.to_string())
}

fn unknown_location(id: LocationId) -> EpiError {
    EpiError::UnknownLocation(id.to_string())
}

pub trait ContextPopulationExt {
    fn add_household(&mut self, label: &str) -> Result<LocationId, EpiError>;

    fn add_facility(&mut self, label: &str, capacity: Option<usize>)
        -> Result<LocationId, EpiError>;

    /// Adds a person to the household labelled `record.home` and places them there.
    fn add_person(&mut self, label: &str, record: &PersonRecord) -> Result<PersonId, EpiError>;

    /// Adds every household, facility and person in `file`, in that order.
    fn load_population(&mut self, file: &PopulationFile) -> Result<(), EpiError>;

    /// Moves a person to `to`: removes them from their current location's occupants, adds them
    /// to the new one and repoints `location`. Moving to the current location is a no-op.
    fn move_person(&mut self, person: PersonId, to: LocationId) -> Result<(), EpiError>;

    fn person(&self, id: PersonId) -> Result<&Person, EpiError>;

    fn person_mut(&mut self, id: PersonId) -> Result<&mut Person, EpiError>;

    fn location(&self, id: LocationId) -> Result<&Location, EpiError>;

    /// All people in insertion order.
    fn people(&self) -> &[Person];

    fn population_size(&self) -> usize;

    fn person_id(&self, label: &str) -> Option<PersonId>;

    fn household_id(&self, label: &str) -> Option<LocationId>;

    fn facility_id(&self, label: &str) -> Option<LocationId>;
}

impl ContextPopulationExt for Context {
    fn add_household(&mut self, label: &str) -> Result<LocationId, EpiError> {
        let data = self.get_data_container_mut::<PopulationData>();
        if data.household_ids.contains_key(label) {
            return Err(EpiError::InvalidConfig(format!("duplicate household id {label}")));
        }
        let id = LocationId::Household(data.households.len());
        data.households.push(Location::new(id, label, None));
        data.household_ids.insert(label.to_string(), id);
        Ok(id)
    }

    fn add_facility(
        &mut self,
        label: &str,
        capacity: Option<usize>,
    ) -> Result<LocationId, EpiError> {
        let data = self.get_data_container_mut::<PopulationData>();
        if data.facility_ids.contains_key(label) {
            return Err(EpiError::InvalidConfig(format!("duplicate facility id {label}")));
        }
        let id = LocationId::Facility(data.facilities.len());
        data.facilities.push(Location::new(id, label, capacity));
        data.facility_ids.insert(label.to_string(), id);
        Ok(id)
    }

    fn add_person(&mut self, label: &str, record: &PersonRecord) -> Result<PersonId, EpiError> {
        let data = self.get_data_container_mut::<PopulationData>();
        if data.person_ids.contains_key(label) {
            return Err(EpiError::InvalidConfig(format!("duplicate person id {label}")));
        }
        let household = *data
            .household_ids
            .get(&record.home)
            .ok_or_else(|| EpiError::UnknownLocation(format!("household {}", record.home)))?;

        let id = PersonId(data.people.len());
        data.people.push(Person {
            id,
            label: label.to_string(),
            age: record.age,
            sex: record.sex,
            household,
            location: household,
            masked: false,
            vaccination: None,
            states: BTreeMap::new(),
            timelines: BTreeMap::new(),
            invisible: false,
        });
        data.person_ids.insert(label.to_string(), id);
        data.location_mut(household)
            .ok_or_else(|| unknown_location(household))?
            .add(id);
        Ok(id)
    }

    fn load_population(&mut self, file: &PopulationFile) -> Result<(), EpiError> {
        for label in file.homes.keys() {
            self.add_household(label)?;
        }
        for (label, record) in &file.places {
            let capacity = record.capacity.and_then(|capacity| usize::try_from(capacity).ok());
            let id = self.add_facility(label, capacity)?;
            self.get_data_container_mut::<PopulationData>()
                .location_mut(id)
                .ok_or_else(|| unknown_location(id))?
                .name
                .clone_from(&record.label);
        }
        for (label, record) in &file.people {
            self.add_person(label, record)?;
        }
        debug!(
            "loaded {} people, {} households and {} facilities",
            file.people.len(),
            file.homes.len(),
            file.places.len()
        );
        Ok(())
    }

    fn move_person(&mut self, person: PersonId, to: LocationId) -> Result<(), EpiError> {
        let data = self.get_data_container_mut::<PopulationData>();
        if data.location(to).is_none() {
            return Err(unknown_location(to));
        }
        let from = data.people.get(person.0).ok_or_else(|| unknown_person(person))?.location;
        if from == to {
            return Ok(());
        }

        data.location_mut(from).ok_or_else(|| unknown_location(from))?.remove(person);
        data.location_mut(to).ok_or_else(|| unknown_location(to))?.add(person);
        data.people[person.0].location = to;
        trace!("moved {person} from {from} to {to}");
        Ok(())
    }

    fn person(&self, id: PersonId) -> Result<&Person, EpiError> {
        self.get_data_container::<PopulationData>()
            .and_then(|data| data.people.get(id.0))
            .ok_or_else(|| unknown_person(id))
    }

    fn person_mut(&mut self, id: PersonId) -> Result<&mut Person, EpiError> {
        self.get_data_container_mut::<PopulationData>()
            .people
            .get_mut(id.0)
            .ok_or_else(|| unknown_person(id))
    }

    fn location(&self, id: LocationId) -> Result<&Location, EpiError> {
        self.get_data_container::<PopulationData>()
            .and_then(|data| data.location(id))
            .ok_or_else(|| unknown_location(id))
    }

    fn people(&self) -> &[Person] {
        self.get_data_container::<PopulationData>()
            .map(|data| data.people.as_slice())
            .unwrap_or_default()
    }

    fn population_size(&self) -> usize {
        self.people().len()
    }

    fn person_id(&self, label: &str) -> Option<PersonId> {
        self.get_data_container::<PopulationData>()?
            .person_ids
            .get(label)
            .copied()
    }

    fn household_id(&self, label: &str) -> Option<LocationId> {
        self.get_data_container::<PopulationData>()?
            .household_ids
            .get(label)
            .copied()
    }

    fn facility_id(&self, label: &str) -> Option<LocationId> {
        self.get_data_container::<PopulationData>()?
            .facility_ids
            .get(label)
            .copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(home: &str) -> PersonRecord {
        PersonRecord {
            sex: Sex::Male,
            age: 40,
            home: home.to_string(),
        }
    }

    #[test]
    fn people_start_at_home() {
        let mut context = Context::new();
        let home = context.add_household("h1").unwrap();
        let alice = context.add_person("1", &record("h1")).unwrap();

        assert_eq!(context.person(alice).unwrap().location, home);
        assert_eq!(context.location(home).unwrap().occupants(), &[alice]);
        assert_eq!(context.person_id("1"), Some(alice));
        assert_eq!(context.population_size(), 1);
    }

    #[test]
    fn unknown_household_is_an_error() {
        let mut context = Context::new();
        assert!(matches!(
            context.add_person("1", &record("nowhere")),
            Err(EpiError::UnknownLocation(_))
        ));
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let mut context = Context::new();
        context.add_household("h1").unwrap();
        assert!(context.add_household("h1").is_err());
        context.add_person("1", &record("h1")).unwrap();
        assert!(context.add_person("1", &record("h1")).is_err());
    }

    #[test]
    fn moving_never_duplicates_membership() {
        let mut context = Context::new();
        let home = context.add_household("h1").unwrap();
        let shop = context.add_facility("f1", Some(10)).unwrap();
        let bob = context.add_person("2", &record("h1")).unwrap();

        context.move_person(bob, shop).unwrap();
        context.move_person(bob, shop).unwrap();
        assert_eq!(context.location(shop).unwrap().occupants(), &[bob]);
        assert_eq!(context.location(home).unwrap().occupancy(), 0);
        assert_eq!(context.person(bob).unwrap().location, shop);

        context.move_person(bob, home).unwrap();
        assert_eq!(context.location(shop).unwrap().occupancy(), 0);
        assert_eq!(context.location(home).unwrap().occupants(), &[bob]);

        assert!(context.move_person(bob, LocationId::Facility(9)).is_err());
        assert!(context.move_person(PersonId(9), home).is_err());
    }

    #[test]
    fn load_population_file() {
        let json = r#"{
            "people": {"1": {"sex": 1, "age": 34, "home": "10"}, "2": {"age": 8, "home": "10"}},
            "homes": {"10": "cbg-1"},
            "places": {"20": {"label": "Grocery", "capacity": 5}, "21": {"capacity": -1}}
        }"#;
        let file = PopulationFile::from_json_str(json).unwrap();
        let mut context = Context::new();
        context.load_population(&file).unwrap();

        assert_eq!(context.population_size(), 2);
        let grocery = context.facility_id("20").unwrap();
        assert_eq!(context.location(grocery).unwrap().name.as_deref(), Some("Grocery"));
        assert_eq!(context.location(grocery).unwrap().label, "20");
        assert_eq!(context.location(grocery).unwrap().capacity, Some(5));
        let open = context.facility_id("21").unwrap();
        assert_eq!(context.location(open).unwrap().capacity, None);
        let home = context.household_id("10").unwrap();
        assert_eq!(context.location(home).unwrap().occupancy(), 2);
        let first = context.person_id("1").unwrap();
        assert_eq!(context.person(first).unwrap().sex, Sex::Female);
    }
}
