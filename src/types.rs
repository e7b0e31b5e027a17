use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;

// ---------- Flight fields ----------

/// The seven attributes of the training dataset, named as its columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Flight,
    Time,
    Length,
    Airline,
    AirportFrom,
    AirportTo,
    DayOfWeek,
}

impl Field {
    pub const ALL: [Field; 7] = [
        Field::Flight,
        Field::Time,
        Field::Length,
        Field::Airline,
        Field::AirportFrom,
        Field::AirportTo,
        Field::DayOfWeek,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Field::Flight => "Flight",
            Field::Time => "Time",
            Field::Length => "Length",
            Field::Airline => "Airline",
            Field::AirportFrom => "AirportFrom",
            Field::AirportTo => "AirportTo",
            Field::DayOfWeek => "DayOfWeek",
        }
    }

    pub fn from_name(name: &str) -> Option<Field> {
        Field::ALL.into_iter().find(|f| f.name() == name)
    }

    /// String-valued fields only make sense one-hot encoded.
    pub fn is_textual(self) -> bool {
        matches!(self, Field::Airline | Field::AirportFrom | Field::AirportTo)
    }

    /// Integer fields that are never expanded into indicator columns.
    pub fn is_numeric_only(self) -> bool {
        matches!(self, Field::Flight | Field::Time | Field::Length)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------- Airline codes ----------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Airline {
    CO,
    US,
    AA,
    AS,
    DL,
    B6,
    HA,
    OO,
    OH,
    EV,
    XE,
    UA,
    MQ,
    WN,
    F9,
    YV,
    NineE,
}

impl Airline {
    /// Display order of the form's select box.
    pub const ALL: [Airline; 17] = [
        Airline::CO,
        Airline::US,
        Airline::AA,
        Airline::AS,
        Airline::DL,
        Airline::B6,
        Airline::HA,
        Airline::OO,
        Airline::OH,
        Airline::EV,
        Airline::XE,
        Airline::UA,
        Airline::MQ,
        Airline::WN,
        Airline::F9,
        Airline::YV,
        Airline::NineE,
    ];

    pub fn code(self) -> &'static str {
        match self {
            Airline::CO => "CO",
            Airline::US => "US",
            Airline::AA => "AA",
            Airline::AS => "AS",
            Airline::DL => "DL",
            Airline::B6 => "B6",
            Airline::HA => "HA",
            Airline::OO => "OO",
            Airline::OH => "OH",
            Airline::EV => "EV",
            Airline::XE => "XE",
            Airline::UA => "UA",
            Airline::MQ => "MQ",
            Airline::WN => "WN",
            Airline::F9 => "F9",
            Airline::YV => "YV",
            Airline::NineE => "9E",
        }
    }
}

impl FromStr for Airline {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim().to_ascii_uppercase();
        Airline::ALL
            .into_iter()
            .find(|a| a.code() == code)
            .ok_or_else(|| ValidationError::UnknownAirline(s.to_string()))
    }
}

impl fmt::Display for Airline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

// ---------- Raw record ----------

/// One flight as entered by a user. Constructed through [`RawRecord::new`],
/// which applies the trivial bounds checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    flight: u32,
    time: u32,
    length: u32,
    airline: Airline,
    airport_from: String,
    airport_to: String,
    day_of_week: u8,
}

impl RawRecord {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        flight: i64,
        time: i64,
        length: i64,
        airline: Airline,
        airport_from: &str,
        airport_to: &str,
        day_of_week: i64,
    ) -> Result<Self, ValidationError> {
        Ok(Self {
            flight: bounded("Flight", flight, 1)?,
            time: bounded("Time", time, 0)?,
            length: bounded("Length", length, 0)?,
            airline,
            airport_from: airport_code("AirportFrom", airport_from)?,
            airport_to: airport_code("AirportTo", airport_to)?,
            day_of_week: match day_of_week {
                1..=7 => day_of_week as u8,
                other => return Err(ValidationError::DayOutOfRange(other)),
            },
        })
    }

    pub fn airline(&self) -> Airline {
        self.airline
    }

    pub fn airport_from(&self) -> &str {
        &self.airport_from
    }

    pub fn airport_to(&self) -> &str {
        &self.airport_to
    }

    /// The value a field takes in this record, as its column text.
    pub fn value_of(&self, field: Field) -> String {
        match field {
            Field::Flight => self.flight.to_string(),
            Field::Time => self.time.to_string(),
            Field::Length => self.length.to_string(),
            Field::Airline => self.airline.code().to_string(),
            Field::AirportFrom => self.airport_from.clone(),
            Field::AirportTo => self.airport_to.clone(),
            Field::DayOfWeek => self.day_of_week.to_string(),
        }
    }

    /// Numeric value of an integer field; `None` for string-valued fields.
    pub fn numeric(&self, field: Field) -> Option<f32> {
        match field {
            Field::Flight => Some(self.flight as f32),
            Field::Time => Some(self.time as f32),
            Field::Length => Some(self.length as f32),
            Field::DayOfWeek => Some(self.day_of_week as f32),
            Field::Airline | Field::AirportFrom | Field::AirportTo => None,
        }
    }
}

fn bounded(field: &'static str, value: i64, min: i64) -> Result<u32, ValidationError> {
    if value < min {
        return Err(ValidationError::BelowMinimum { field, min, value });
    }
    u32::try_from(value).map_err(|_| ValidationError::AboveMaximum {
        field,
        max: i64::from(u32::MAX),
        value,
    })
}

fn airport_code(field: &'static str, raw: &str) -> Result<String, ValidationError> {
    let code = raw.trim().to_uppercase();
    if code.is_empty() {
        return Err(ValidationError::EmptyAirport(field));
    }
    Ok(code)
}

// ---------- Request payloads ----------

/// HTML form body. Everything arrives as text so bad numbers can be shown
/// back to the user instead of failing extraction.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct FlightForm {
    #[serde(default)]
    pub flight: String,
    #[serde(default)]
    pub time: String,
    #[serde(default)]
    pub length: String,
    #[serde(default)]
    pub airline: String,
    #[serde(default)]
    pub day_of_week: String,
    #[serde(default)]
    pub airport_from: String,
    #[serde(default)]
    pub airport_to: String,
}

impl Default for FlightForm {
    fn default() -> Self {
        Self {
            flight: "100".into(),
            time: "0".into(),
            length: "0".into(),
            airline: Airline::ALL[0].code().into(),
            day_of_week: "1".into(),
            airport_from: "ATL".into(),
            airport_to: "SFO".into(),
        }
    }
}

impl TryFrom<&FlightForm> for RawRecord {
    type Error = ValidationError;

    fn try_from(form: &FlightForm) -> Result<Self, Self::Error> {
        RawRecord::new(
            whole_number("Flight", &form.flight)?,
            whole_number("Time", &form.time)?,
            whole_number("Length", &form.length)?,
            form.airline.parse()?,
            &form.airport_from,
            &form.airport_to,
            whole_number("DayOfWeek", &form.day_of_week)?,
        )
    }
}

fn whole_number(field: &'static str, raw: &str) -> Result<i64, ValidationError> {
    raw.trim()
        .parse::<i64>()
        .map_err(|_| ValidationError::NotANumber {
            field,
            value: raw.to_string(),
        })
}

/// JSON API body.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PredictRequest {
    pub flight: i64,
    pub time: i64,
    pub length: i64,
    pub airline: String,
    pub day_of_week: i64,
    pub airport_from: String,
    pub airport_to: String,
}

impl TryFrom<&PredictRequest> for RawRecord {
    type Error = ValidationError;

    fn try_from(req: &PredictRequest) -> Result<Self, Self::Error> {
        RawRecord::new(
            req.flight,
            req.time,
            req.length,
            req.airline.parse()?,
            &req.airport_from,
            &req.airport_to,
            req.day_of_week,
        )
    }
}

// ---------- Prediction ----------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Label {
    Delayed,
    OnTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Prediction {
    pub label: Label,
    pub probability_on_time: f32,
    pub probability_delayed: f32,
}

impl Prediction {
    /// Builds a prediction from P(delayed); the pair always sums to 1.
    pub fn from_delay_probability(p_delayed: f32) -> Self {
        let p_delayed = p_delayed.clamp(0.0, 1.0);
        Self {
            label: if p_delayed > 0.5 {
                Label::Delayed
            } else {
                Label::OnTime
            },
            probability_on_time: 1.0 - p_delayed,
            probability_delayed: p_delayed,
        }
    }

    /// Probability of the predicted label, in percent.
    pub fn confidence_percent(&self) -> f32 {
        match self.label {
            Label::Delayed => self.probability_delayed * 100.0,
            Label::OnTime => self.probability_on_time * 100.0,
        }
    }
}
