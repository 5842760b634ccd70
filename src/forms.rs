//! Creation forms for expenses, crops and parcels.
//!
//! All three pages share one shape: a draft of string fields, a mapping from
//! draft keys to payload keys, a list of numeric fields, and the foreign keys
//! the API requires. [`FormSpec`] captures that shape once; [`FormDraft`]
//! holds the user's input and submits it.
//!
//! Numeric fields never block a submission: anything that does not start
//! with a number is sent as `0`.

use std::str::FromStr;
use std::sync::LazyLock;

use anyhow::Result;
use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Number, Value};

use crate::activity::events::EventLog;
use crate::api::{ApiClient, SubmitOutcome};
use crate::config::schema::{FormsConfig, OwnerSource};
use crate::identity::{self, UserId};
use crate::session::SessionStore;

// ---------------------------------------------------------------------------
// Form specifications
// ---------------------------------------------------------------------------

/// The three resources a user can create.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FormKind {
    Gastos,
    Cultivos,
    Parcelas,
}

impl FormKind {
    pub const ALL: [FormKind; 3] = [Self::Gastos, Self::Cultivos, Self::Parcelas];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gastos => "gastos",
            Self::Cultivos => "cultivos",
            Self::Parcelas => "parcelas",
        }
    }

    pub fn spec(&self) -> &'static FormSpec {
        match self {
            Self::Gastos => &GASTOS,
            Self::Cultivos => &CULTIVOS,
            Self::Parcelas => &PARCELAS,
        }
    }
}

impl std::fmt::Display for FormKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FormKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "gastos" | "expenses" => Ok(Self::Gastos),
            "cultivos" | "crops" => Ok(Self::Cultivos),
            "parcelas" | "parcels" => Ok(Self::Parcelas),
            other => anyhow::bail!("unknown form '{other}' (expected gastos, cultivos or parcelas)"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Text,
    Number,
}

/// One input of a form.
#[derive(Debug)]
pub struct FieldSpec {
    /// Name of the input in the draft.
    pub draft_key: &'static str,
    /// Key in the JSON payload.
    pub payload_key: &'static str,
    pub label: &'static str,
    pub kind: FieldKind,
}

/// Foreign keys a payload carries besides the user's input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForeignKey {
    User,
    Parcel,
}

impl ForeignKey {
    pub fn payload_key(&self) -> &'static str {
        match self {
            Self::User => "id_usuario",
            Self::Parcel => "id_parcela",
        }
    }
}

/// Endpoint, field mapping and foreign keys of one form.
#[derive(Debug)]
pub struct FormSpec {
    pub kind: FormKind,
    pub endpoint: &'static str,
    pub title: &'static str,
    pub fields: &'static [FieldSpec],
    pub foreign_keys: &'static [ForeignKey],
}

impl FormSpec {
    pub fn field(&self, draft_key: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.draft_key == draft_key)
    }
}

const fn text(draft_key: &'static str, label: &'static str) -> FieldSpec {
    FieldSpec {
        draft_key,
        payload_key: draft_key,
        label,
        kind: FieldKind::Text,
    }
}

const fn number(draft_key: &'static str, payload_key: &'static str, label: &'static str) -> FieldSpec {
    FieldSpec {
        draft_key,
        payload_key,
        label,
        kind: FieldKind::Number,
    }
}

pub static GASTOS: FormSpec = FormSpec {
    kind: FormKind::Gastos,
    endpoint: "/gastos",
    title: "Registra tus gastos trimestrales",
    fields: &[
        number("agua", "gasto_agua", "Agua"),
        number("gas", "gasto_gas", "Gas"),
        number("luz", "gasto_luz", "Luz"),
        number("semillas", "gasto_semillas", "Semillas"),
        number("fertilizantes", "gasto_fertilizantes", "Fertilizantes"),
        number("mano_obra", "gasto_mantenimiento", "Mano de obra"),
        number("combustible", "gasto_combustible", "Combustible"),
    ],
    foreign_keys: &[ForeignKey::User],
};

pub static CULTIVOS: FormSpec = FormSpec {
    kind: FormKind::Cultivos,
    endpoint: "/cultivos",
    title: "Registra un cultivo",
    fields: &[
        text("tipo_cultivo", "Tipo de cultivo"),
        text("mes_siembra", "Mes de siembra"),
        text("mes_cosecha", "Mes de cosecha"),
        number(
            "produccion_anio_pasado",
            "produccion_anio_pasado",
            "Producción del año pasado",
        ),
        number(
            "produccion_anio_antepasado",
            "produccion_anio_antepasado",
            "Producción del año antepasado",
        ),
    ],
    foreign_keys: &[ForeignKey::Parcel, ForeignKey::User],
};

pub static PARCELAS: FormSpec = FormSpec {
    kind: FormKind::Parcelas,
    endpoint: "/parcelas",
    title: "Registra una parcela",
    fields: &[
        text("nombre_parcela", "Nombre de la parcela"),
        text("ubicacion", "Ubicación"),
        number("tamano", "tamano", "Tamaño (hectáreas)"),
        text("tipo_tenencia", "Tipo de tenencia"),
        text("sistema_riego", "Sistema de riego"),
    ],
    foreign_keys: &[ForeignKey::User],
};

// ---------------------------------------------------------------------------
// Numeric parsing
// ---------------------------------------------------------------------------

/// Leading decimal number, optionally signed, with optional exponent.
static LEADING_NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[+-]?(?:\d+\.?\d*|\.\d+)(?:[eE][+-]?\d+)?")
        .expect("leading number regex must compile")
});

/// Parse the numeric prefix of a draft value (`"12.5 kg"` → `12.5`).
///
/// Returns `0.0` when there is no numeric prefix or the value is not finite.
pub fn parse_number(raw: &str) -> f64 {
    LEADING_NUMBER_RE
        .find(raw.trim_start())
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .filter(|n| n.is_finite())
        .unwrap_or(0.0)
}

/// JSON value for a parsed number; integral values become JSON integers.
pub fn number_value(n: f64) -> Value {
    const MAX_SAFE: f64 = 9_007_199_254_740_991.0;
    if n.fract() == 0.0 && n.abs() <= MAX_SAFE {
        Value::from(n as i64)
    } else {
        Number::from_f64(n).map(Value::Number).unwrap_or_else(|| Value::from(0))
    }
}

// ---------------------------------------------------------------------------
// Foreign keys
// ---------------------------------------------------------------------------

/// Values for the foreign keys of a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForeignKeys {
    pub user_id: UserId,
    pub parcel_id: u64,
}

impl ForeignKeys {
    /// Resolve foreign keys from the `[forms]` config and the session.
    ///
    /// With `owner = "session"` the user id comes from the stored token and
    /// falls back to `fixed_user_id` when the token yields none.
    pub fn resolve(
        config: &FormsConfig,
        session: &dyn SessionStore,
        parcel_override: Option<u64>,
    ) -> Self {
        let user_id = match config.owner {
            OwnerSource::Session => identity::extract_user_id(session.read().as_deref())
                .unwrap_or(config.fixed_user_id),
            OwnerSource::Fixed => config.fixed_user_id,
        };
        Self {
            user_id,
            parcel_id: parcel_override.unwrap_or(config.parcel_id),
        }
    }

    fn value_for(&self, key: ForeignKey) -> Value {
        match key {
            ForeignKey::User => Value::from(self.user_id),
            ForeignKey::Parcel => Value::from(self.parcel_id),
        }
    }
}

// ---------------------------------------------------------------------------
// Draft
// ---------------------------------------------------------------------------

/// The user's in-progress input for one form. Never persisted.
#[derive(Debug, Clone)]
pub struct FormDraft {
    spec: &'static FormSpec,
    values: Vec<String>,
}

/// Serializable snapshot of a draft for the web frontend.
#[derive(Debug, Serialize)]
pub struct DraftView {
    pub form: FormKind,
    pub title: &'static str,
    pub fields: Vec<FieldView>,
}

#[derive(Debug, Serialize)]
pub struct FieldView {
    pub name: &'static str,
    pub label: &'static str,
    pub kind: FieldKind,
    pub value: String,
}

impl FormDraft {
    /// An all-empty draft.
    pub fn new(kind: FormKind) -> Self {
        let spec = kind.spec();
        Self {
            spec,
            values: vec![String::new(); spec.fields.len()],
        }
    }

    pub fn kind(&self) -> FormKind {
        self.spec.kind
    }

    pub fn spec(&self) -> &'static FormSpec {
        self.spec
    }

    fn index(&self, key: &str) -> Result<usize> {
        self.spec
            .fields
            .iter()
            .position(|f| f.draft_key == key)
            .ok_or_else(|| {
                let known: Vec<&str> = self.spec.fields.iter().map(|f| f.draft_key).collect();
                anyhow::anyhow!(
                    "unknown field '{key}' for {} (expected one of: {})",
                    self.spec.kind,
                    known.join(", ")
                )
            })
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.index(key).ok().map(|i| self.values[i].as_str())
    }

    /// Set one field. Unknown keys are an error.
    pub fn set(&mut self, key: &str, value: impl Into<String>) -> Result<()> {
        let i = self.index(key)?;
        self.values[i] = value.into();
        Ok(())
    }

    /// Apply `key=value` assignments.
    pub fn apply_assignments<'a>(&mut self, pairs: impl IntoIterator<Item = &'a str>) -> Result<()> {
        for pair in pairs {
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| anyhow::anyhow!("expected key=value, got '{pair}'"))?;
            self.set(key.trim(), value)?;
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.values.iter().all(String::is_empty)
    }

    /// Back to the initial all-empty shape.
    pub fn reset(&mut self) {
        self.values.iter_mut().for_each(String::clear);
    }

    /// The JSON body for the creation request.
    pub fn payload(&self, keys: &ForeignKeys) -> Value {
        let mut body = Map::new();
        for &fk in self.spec.foreign_keys {
            body.insert(fk.payload_key().to_string(), keys.value_for(fk));
        }
        for (field, raw) in self.spec.fields.iter().zip(&self.values) {
            let value = match field.kind {
                FieldKind::Text => Value::String(raw.clone()),
                FieldKind::Number => number_value(parse_number(raw)),
            };
            body.insert(field.payload_key.to_string(), value);
        }
        Value::Object(body)
    }

    /// Send the draft. Resets it on success; leaves it untouched on failure.
    pub fn submit(&mut self, client: &ApiClient, keys: &ForeignKeys) -> SubmitOutcome {
        let outcome = client.create(self.spec.endpoint, &self.payload(keys));
        if outcome.is_success() {
            self.reset();
        }
        outcome
    }

    pub fn view(&self) -> DraftView {
        DraftView {
            form: self.spec.kind,
            title: self.spec.title,
            fields: self
                .spec
                .fields
                .iter()
                .zip(&self.values)
                .map(|(f, v)| FieldView {
                    name: f.draft_key,
                    label: f.label,
                    kind: f.kind,
                    value: v.clone(),
                })
                .collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Submitter
// ---------------------------------------------------------------------------

/// Submits drafts and records the outcome in the event log.
#[derive(Debug, Clone)]
pub struct FormSubmitter {
    api: ApiClient,
    log: EventLog,
}

impl FormSubmitter {
    pub fn new(api: ApiClient, log: EventLog) -> Self {
        Self { api, log }
    }

    pub fn submit(&self, draft: &mut FormDraft, keys: &ForeignKeys) -> SubmitOutcome {
        let form = draft.kind().as_str();
        let outcome = draft.submit(&self.api, keys);
        match &outcome {
            SubmitOutcome::Success(_) => self.log.form_submitted(form, keys.user_id),
            SubmitOutcome::Failure(reason) => self.log.form_failed(form, keys.user_id, reason),
        }
        outcome
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::MemorySessionStore;
    use base64::Engine as _;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use serde_json::json;

    const KEYS: ForeignKeys = ForeignKeys {
        user_id: 22,
        parcel_id: 5,
    };

    #[test]
    fn parse_number_mirrors_prefix_parsing() {
        assert_eq!(parse_number("12.5"), 12.5);
        assert_eq!(parse_number("  7kg"), 7.0);
        assert_eq!(parse_number("-3"), -3.0);
        assert_eq!(parse_number(".5"), 0.5);
        assert_eq!(parse_number("1e3"), 1000.0);
        assert_eq!(parse_number("1e"), 1.0);
        assert_eq!(parse_number(""), 0.0);
        assert_eq!(parse_number("abc"), 0.0);
        assert_eq!(parse_number("-"), 0.0);
        assert_eq!(parse_number("1e999"), 0.0);
    }

    #[test]
    fn number_value_prefers_integers() {
        assert_eq!(number_value(0.0), json!(0));
        assert_eq!(number_value(1200.0), json!(1200));
        assert_eq!(number_value(-4.0), json!(-4));
        assert_eq!(number_value(2.5), json!(2.5));
    }

    #[test]
    fn form_kind_parses_names_and_aliases() {
        assert_eq!("GASTOS".parse::<FormKind>().unwrap(), FormKind::Gastos);
        assert_eq!("crops".parse::<FormKind>().unwrap(), FormKind::Cultivos);
        assert!("usuarios".parse::<FormKind>().is_err());
        for kind in FormKind::ALL {
            assert_eq!(kind.spec().kind, kind);
        }
    }

    #[test]
    fn expense_payload_maps_fields_and_defaults_bad_numbers() {
        let mut draft = FormDraft::new(FormKind::Gastos);
        draft.set("agua", "no sé").unwrap();
        draft.set("gas", "150.75").unwrap();
        draft.set("mano_obra", "300").unwrap();

        let payload = draft.payload(&KEYS);
        assert_eq!(payload["id_usuario"], json!(22));
        assert_eq!(payload["gasto_agua"], json!(0));
        assert_eq!(payload["gasto_gas"], json!(150.75));
        assert_eq!(payload["gasto_mantenimiento"], json!(300));
        assert_eq!(payload["gasto_combustible"], json!(0));
        assert!(payload.get("id_parcela").is_none());
        assert_eq!(payload.as_object().unwrap().len(), 8);
    }

    #[test]
    fn crop_payload_keeps_months_as_text() {
        let mut draft = FormDraft::new(FormKind::Cultivos);
        draft
            .apply_assignments(["tipo_cultivo=Maíz", "mes_siembra=5", "produccion_anio_pasado=2.4"])
            .unwrap();

        let payload = draft.payload(&KEYS);
        assert_eq!(payload["id_parcela"], json!(5));
        assert_eq!(payload["id_usuario"], json!(22));
        assert_eq!(payload["tipo_cultivo"], json!("Maíz"));
        assert_eq!(payload["mes_siembra"], json!("5"));
        assert_eq!(payload["mes_cosecha"], json!(""));
        assert_eq!(payload["produccion_anio_pasado"], json!(2.4));
        assert_eq!(payload["produccion_anio_antepasado"], json!(0));
    }

    #[test]
    fn parcel_payload_parses_size() {
        let mut draft = FormDraft::new(FormKind::Parcelas);
        draft.set("nombre_parcela", "La Loma").unwrap();
        draft.set("tamano", "3.5 ha").unwrap();
        let payload = draft.payload(&KEYS);
        assert_eq!(payload["tamano"], json!(3.5));
        assert_eq!(payload["nombre_parcela"], json!("La Loma"));
    }

    #[test]
    fn unknown_fields_and_malformed_assignments_are_rejected() {
        let mut draft = FormDraft::new(FormKind::Parcelas);
        assert!(draft.set("agua", "1").is_err());
        assert!(draft.apply_assignments(["tamano"]).is_err());
        assert!(draft.is_empty());
    }

    #[test]
    fn assignment_values_may_contain_equals() {
        let mut draft = FormDraft::new(FormKind::Parcelas);
        draft.apply_assignments(["ubicacion=km=12"]).unwrap();
        assert_eq!(draft.get("ubicacion"), Some("km=12"));
    }

    #[test]
    fn reset_restores_empty_shape() {
        let mut draft = FormDraft::new(FormKind::Gastos);
        draft.set("luz", "80").unwrap();
        assert!(!draft.is_empty());
        draft.reset();
        assert!(draft.is_empty());
        assert_eq!(draft.view().fields.len(), GASTOS.fields.len());
    }

    #[test]
    fn failed_submission_keeps_draft() {
        let client = ApiClient::new("http://127.0.0.1:1", std::time::Duration::from_secs(2));
        let mut draft = FormDraft::new(FormKind::Cultivos);
        draft.set("tipo_cultivo", "Frijol").unwrap();

        let outcome = draft.submit(&client, &KEYS);
        assert!(!outcome.is_success());
        assert_eq!(draft.get("tipo_cultivo"), Some("Frijol"));
    }

    #[test]
    fn foreign_keys_follow_owner_source() {
        let token = format!("h.{}.s", URL_SAFE_NO_PAD.encode(r#"{"sub":"42"}"#));
        let session = MemorySessionStore::with_token(token);
        let mut config = FormsConfig::default();

        let keys = ForeignKeys::resolve(&config, &session, None);
        assert_eq!(keys, ForeignKeys { user_id: 42, parcel_id: 1 });

        config.owner = OwnerSource::Fixed;
        config.fixed_user_id = 22;
        let keys = ForeignKeys::resolve(&config, &session, Some(9));
        assert_eq!(keys, ForeignKeys { user_id: 22, parcel_id: 9 });

        config.owner = OwnerSource::Session;
        let keys = ForeignKeys::resolve(&config, &MemorySessionStore::new(), None);
        assert_eq!(keys.user_id, 22);
    }
}
