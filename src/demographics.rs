//! Choosing a disease model by demographic group.
//!
//! Each disease can have several state machines, each tagged with a [`DemographicFilter`] such
//! as `{"Age": "65+", "Sex": "F"}`. [`DiseaseModelRegistry::select`] picks the machine whose
//! filter matches a person and constrains the most attributes.

use std::collections::BTreeMap;

use crate::error::EpiError;
use crate::people::{Person, Sex};
use crate::state_machine::{DiseaseStateMachine, StateMachineConfig, StateMachineDefinition};

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum AgeRange {
    #[default]
    Any,
    /// Inclusive on both ends.
    Between(u8, u8),
    AtLeast(u8),
}

impl AgeRange {
    fn parse(value: &str) -> Result<Self, EpiError> {
        let value = value.trim();
        let number = |text: &str| {
            text.trim()
                .parse::<u8>()
                .map_err(|_| EpiError::InvalidConfig(format!("invalid age group {value:?}")))
        };

        if value == "*" || value.is_empty() {
            Ok(AgeRange::Any)
        } else if let Some(min) = value.strip_suffix('+') {
            Ok(AgeRange::AtLeast(number(min)?))
        } else if let Some((min, max)) = value.split_once('-') {
            let (min, max) = (number(min)?, number(max)?);
            if min > max {
                return Err(EpiError::InvalidConfig(format!("invalid age group {value:?}")));
            }
            Ok(AgeRange::Between(min, max))
        } else {
            let age = number(value)?;
            Ok(AgeRange::Between(age, age))
        }
    }

    #[must_use]
    pub fn contains(self, age: u8) -> bool {
        match self {
            AgeRange::Any => true,
            AgeRange::Between(min, max) => (min..=max).contains(&age),
            AgeRange::AtLeast(min) => age >= min,
        }
    }
}

/// The demographic group a state machine applies to. `None` fields match anyone.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct DemographicFilter {
    pub age: AgeRange,
    pub sex: Option<Sex>,
    pub vaccinated: Option<bool>,
}

impl DemographicFilter {
    /// Parses the `{"Age", "Sex", "Vaccination Status"}` map attached to stored state machines.
    /// Missing keys and `"*"` match anyone; other keys are rejected.
    pub fn from_map(map: &BTreeMap<String, String>) -> Result<Self, EpiError> {
        let mut filter = DemographicFilter::default();
        for (key, value) in map {
            let value = value.trim();
            match key.as_str() {
                "Age" => filter.age = AgeRange::parse(value)?,
                "Sex" => {
                    filter.sex = match value {
                        "*" => None,
                        "M" | "Male" => Some(Sex::Male),
                        "F" | "Female" => Some(Sex::Female),
                        other => {
                            return Err(EpiError::InvalidConfig(format!("invalid sex {other:?}")));
                        }
                    }
                }
                "Vaccination Status" => {
                    filter.vaccinated = match value {
                        "*" => None,
                        "Vaccinated" => Some(true),
                        "Unvaccinated" => Some(false),
                        other => {
                            return Err(EpiError::InvalidConfig(format!(
                                "invalid vaccination status {other:?}"
                            )));
                        }
                    }
                }
                other => {
                    return Err(EpiError::InvalidConfig(format!("unknown demographic {other:?}")));
                }
            }
        }
        Ok(filter)
    }

    #[must_use]
    pub fn matches(&self, person: &Person) -> bool {
        let vaccinated = person
            .vaccination
            .as_ref()
            .is_some_and(|vaccination| vaccination.doses > 0);
        self.age.contains(person.age)
            && self.sex.is_none_or(|sex| sex == person.sex)
            && self.vaccinated.is_none_or(|wanted| wanted == vaccinated)
    }

    /// How many attributes the filter constrains.
    #[must_use]
    pub fn specificity(&self) -> usize {
        usize::from(self.age != AgeRange::Any)
            + usize::from(self.sex.is_some())
            + usize::from(self.vaccinated.is_some())
    }
}

#[derive(Clone, Debug, Default)]
pub struct DiseaseModelRegistry {
    models: BTreeMap<String, Vec<(DemographicFilter, DiseaseStateMachine)>>,
}

impl DiseaseModelRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        disease: &str,
        filter: DemographicFilter,
        machine: DiseaseStateMachine,
    ) {
        self.models
            .entry(disease.to_string())
            .or_default()
            .push((filter, machine));
    }

    /// Validates and registers a stored state machine under its disease name.
    pub fn register_definition(
        &mut self,
        definition: StateMachineDefinition,
        config: StateMachineConfig,
    ) -> Result<(), EpiError> {
        let filter = DemographicFilter::from_map(&definition.demographics)?;
        let disease = definition.disease_name.clone();
        let machine = definition.into_state_machine(config)?;
        self.register(&disease, filter, machine);
        Ok(())
    }

    #[must_use]
    pub fn diseases(&self) -> Vec<&str> {
        self.models.keys().map(String::as_str).collect()
    }

    /// The matching machine with the most specific filter. Ties go to the machine registered
    /// first.
    #[must_use]
    pub fn select(&self, disease: &str, person: &Person) -> Option<&DiseaseStateMachine> {
        let mut best: Option<&(DemographicFilter, DiseaseStateMachine)> = None;
        let models = self.models.get(disease)?;
        for candidate in models.iter().filter(|(filter, _)| filter.matches(person)) {
            if best.is_none_or(|(filter, _)| candidate.0.specificity() > filter.specificity()) {
                best = Some(candidate);
            }
        }
        best.map(|(_, machine)| machine)
    }
}
