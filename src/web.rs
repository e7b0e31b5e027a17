use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Form, Json, Router,
};
use minijinja::{context, Environment};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;

use crate::assets::Assets;
use crate::error::{InferenceError, ValidationError};
use crate::types::{Airline, Field, FlightForm, Label, Prediction, PredictRequest, RawRecord};

const PAGE: &str = "page.html";

// ---------- Server state ----------

#[derive(Clone)]
pub struct AppState {
    pub assets: Arc<Assets>,
    pub templates: Arc<Environment<'static>>,
}

impl AppState {
    pub fn new(assets: Assets) -> Result<Self, minijinja::Error> {
        Ok(Self {
            assets: Arc::new(assets),
            templates: Arc::new(templates()?),
        })
    }
}

/// Page templates; `.html` names get HTML auto-escaping.
pub fn templates() -> Result<Environment<'static>, minijinja::Error> {
    let mut env = Environment::new();
    env.add_template(PAGE, include_str!("../templates/page.html"))?;
    Ok(env)
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/predict", post(submit))
        .route("/api/predict", post(predict_json))
        .route("/health", get(health))
        .with_state(state)
}

// ---------- Scoring ----------

/// Result of one form submission.
#[derive(Debug)]
pub enum Outcome {
    Predicted {
        record: RawRecord,
        prediction: Prediction,
        unmatched: Vec<Field>,
    },
    Invalid(ValidationError),
    Failed {
        record: RawRecord,
        error: InferenceError,
    },
}

/// Aligns and scores one record, logging anything the user should know about.
fn score(assets: &Assets, record: &RawRecord) -> (Result<Prediction, InferenceError>, Vec<Field>) {
    let unmatched = assets.schema().unmatched_fields(record);
    for field in &unmatched {
        tracing::warn!(
            field = %field,
            value = %record.value_of(*field),
            "value unseen in training; its indicator columns stay zero"
        );
    }

    let row = assets.align(record);
    if tracing::enabled!(tracing::Level::DEBUG) {
        let sample: Vec<String> = row
            .columns()
            .iter()
            .zip(row.values())
            .filter(|(_, v)| **v != 0.0)
            .take(8)
            .map(|(name, v)| format!("{name}={v}"))
            .collect();
        tracing::debug!(
            in_dim = row.len(),
            nonzero = row.nonzero(),
            sample = %sample.join(", "),
            "aligned row"
        );
    }

    let result = assets.predict(&row);
    match &result {
        Ok(p) => tracing::info!(
            label = ?p.label,
            p_delayed = p.probability_delayed,
            "prediction"
        ),
        Err(e) => tracing::warn!(error = %e, "inference failed"),
    }
    (result, unmatched)
}

pub fn evaluate(assets: &Assets, form: &FlightForm) -> Outcome {
    let record = match RawRecord::try_from(form) {
        Ok(record) => record,
        Err(e) => {
            tracing::debug!(error = %e, "rejected form input");
            return Outcome::Invalid(e);
        }
    };
    match score(assets, &record) {
        (Ok(prediction), unmatched) => Outcome::Predicted {
            record,
            prediction,
            unmatched,
        },
        (Err(error), _) => Outcome::Failed { record, error },
    }
}

// ---------- Handlers ----------

async fn index(State(state): State<AppState>) -> Response {
    page_response(&state.templates, StatusCode::OK, &FlightForm::default(), None)
}

async fn submit(State(state): State<AppState>, Form(form): Form<FlightForm>) -> Response {
    let outcome = evaluate(&state.assets, &form);
    let status = match outcome {
        Outcome::Predicted { .. } => StatusCode::OK,
        Outcome::Invalid(_) | Outcome::Failed { .. } => StatusCode::UNPROCESSABLE_ENTITY,
    };
    page_response(&state.templates, status, &form, Some(&outcome))
}

#[derive(Serialize)]
struct PredictResponse {
    label: Label,
    probability_on_time: f32,
    probability_delayed: f32,
    unmatched_fields: Vec<&'static str>,
}

type ApiError = (StatusCode, Json<serde_json::Value>);

fn api_error(status: StatusCode, error: String, hint: &str) -> ApiError {
    (status, Json(json!({ "error": error, "hint": hint })))
}

async fn predict_json(
    State(state): State<AppState>,
    payload: Result<Json<PredictRequest>, JsonRejection>,
) -> Result<Json<PredictResponse>, ApiError> {
    let Json(req) = payload.map_err(|rejection| {
        tracing::debug!(error = %rejection.body_text(), "rejected JSON body");
        api_error(
            rejection.status(),
            rejection.body_text(),
            "Send a JSON object with Flight, Time, Length, Airline, DayOfWeek, AirportFrom and AirportTo.",
        )
    })?;

    let record = RawRecord::try_from(&req)
        .map_err(|e| api_error(StatusCode::UNPROCESSABLE_ENTITY, e.to_string(), e.hint()))?;

    let (result, unmatched) = score(&state.assets, &record);
    let prediction = result
        .map_err(|e| api_error(StatusCode::UNPROCESSABLE_ENTITY, e.to_string(), e.hint()))?;

    Ok(Json(PredictResponse {
        label: prediction.label,
        probability_on_time: prediction.probability_on_time,
        probability_delayed: prediction.probability_delayed,
        unmatched_fields: unmatched.iter().map(|f| f.name()).collect(),
    }))
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "columns": state.assets.schema().len(),
        "model": state.assets.classifier().describe(),
    }))
}

// ---------- Rendering ----------

#[derive(Serialize)]
struct Cell {
    field: &'static str,
    value: String,
}

#[derive(Serialize)]
struct Verdict {
    class: &'static str,
    message: &'static str,
    caption: &'static str,
    percent: String,
}

#[derive(Serialize)]
struct Problem {
    title: &'static str,
    message: String,
    hint: &'static str,
}

fn record_cells(record: &RawRecord) -> Vec<Cell> {
    Field::ALL
        .into_iter()
        .map(|field| Cell {
            field: field.name(),
            value: record.value_of(field),
        })
        .collect()
}

pub fn render_page(
    env: &Environment<'static>,
    form: &FlightForm,
    outcome: Option<&Outcome>,
) -> Result<String, minijinja::Error> {
    let mut record = None;
    let mut verdict = None;
    let mut notices = Vec::new();
    let mut problem = None;

    match outcome {
        Some(Outcome::Predicted {
            record: r,
            prediction,
            unmatched,
        }) => {
            record = Some(record_cells(r));
            let (class, message, caption) = match prediction.label {
                Label::Delayed => ("delayed", "Prediction: DELAYED", "Probability of delay"),
                Label::OnTime => (
                    "ontime",
                    "Prediction: ON TIME",
                    "Probability of on-time departure",
                ),
            };
            verdict = Some(Verdict {
                class,
                message,
                caption,
                percent: format!("{:.2}", prediction.confidence_percent()),
            });
            notices = unmatched
                .iter()
                .map(|field| Cell {
                    field: field.name(),
                    value: r.value_of(*field),
                })
                .collect();
        }
        Some(Outcome::Invalid(e)) => {
            problem = Some(Problem {
                title: "Invalid input",
                message: e.to_string(),
                hint: e.hint(),
            });
        }
        Some(Outcome::Failed { record: r, error }) => {
            record = Some(record_cells(r));
            problem = Some(Problem {
                title: "Prediction failed",
                message: error.to_string(),
                hint: error.hint(),
            });
        }
        None => {}
    }

    let airlines: Vec<&str> = Airline::ALL.iter().map(|a| a.code()).collect();
    let days: Vec<String> = (1..=7).map(|d: u8| d.to_string()).collect();

    env.get_template(PAGE)?.render(context! {
        form => form,
        airlines => airlines,
        days => days,
        record => record,
        verdict => verdict,
        notices => notices,
        problem => problem,
    })
}

fn page_response(
    env: &Environment<'static>,
    status: StatusCode,
    form: &FlightForm,
    outcome: Option<&Outcome>,
) -> Response {
    match render_page(env, form, outcome) {
        Ok(html) => (status, Html(html)).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "failed to render page");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
