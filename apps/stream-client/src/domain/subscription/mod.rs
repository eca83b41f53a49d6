//! Subscription Parameters
//!
//! Domain types describing one analysis-stream subscription. The parameter
//! set fully determines the subscription target: any field change requires
//! closing the current subscription and opening a new one.
//!
//! # Wire Format
//!
//! The upstream API speaks Portuguese query field names. Field names and
//! their order are fixed: `instrumento`, `timeframe`, `tipo_setup`,
//! `gerar_imagem`, `gerar_pdf`, `provider`. Booleans encode as the literal
//! strings `"true"` / `"false"`.

use url::Url;

/// Request path of the analysis stream endpoint, relative to the base URL.
pub const STREAM_PATH: &str = "/api/v1/eruditefx/analyze-stream";

/// Trading setup horizon requested from the analysis engine.
///
/// The intraday variant encodes as `"Intradia"` on the wire; that is the
/// value the upstream API validates against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SetupType {
    /// Short-lived scalp setups.
    Scalp,
    /// Intraday setups (wire value `"Intradia"`).
    Intraday,
    /// Multi-day swing setups.
    Swing,
}

impl SetupType {
    /// Parse a setup type from string, case-insensitively.
    ///
    /// Accepts both the English spelling (`"intraday"`) and the wire spelling
    /// (`"intradia"`). Returns `None` for unknown values.
    #[must_use]
    pub fn from_str_case_insensitive(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "scalp" => Some(Self::Scalp),
            "intraday" | "intradia" => Some(Self::Intraday),
            "swing" => Some(Self::Swing),
            _ => None,
        }
    }

    /// Get the wire value for the `tipo_setup` query field.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Scalp => "Scalp",
            Self::Intraday => "Intradia",
            Self::Swing => "Swing",
        }
    }
}

/// Market data provider backing the analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Provider {
    /// Live Trading Economics data.
    #[default]
    Te,
    /// Static fixture data.
    Static,
}

impl Provider {
    /// Parse a provider from string, case-insensitively.
    ///
    /// Returns `None` for unknown values.
    #[must_use]
    pub fn from_str_case_insensitive(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "te" => Some(Self::Te),
            "static" => Some(Self::Static),
            _ => None,
        }
    }

    /// Get the wire value for the `provider` query field.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Te => "te",
            Self::Static => "static",
        }
    }
}

/// Immutable parameter set for one streaming subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionParameters {
    /// Instrument symbol, e.g. `"EUR/USD"`.
    pub instrument: String,
    /// Chart timeframe, e.g. `"5M"`.
    pub timeframe: String,
    /// Requested setup horizon.
    pub setup_type: SetupType,
    /// Whether the server should render a chart image.
    pub generate_image: bool,
    /// Whether the server should render a PDF report.
    pub generate_pdf: bool,
    /// Market data provider.
    pub provider: Provider,
}

impl SubscriptionParameters {
    /// Create a parameter set with the upstream defaults for the optional
    /// flags (image and PDF generation on, live provider).
    #[must_use]
    pub fn new(
        instrument: impl Into<String>,
        timeframe: impl Into<String>,
        setup_type: SetupType,
    ) -> Self {
        Self {
            instrument: instrument.into(),
            timeframe: timeframe.into(),
            setup_type,
            generate_image: true,
            generate_pdf: true,
            provider: Provider::default(),
        }
    }

    /// Build the full request target for this subscription.
    ///
    /// The base URL's path is replaced with [`STREAM_PATH`] and the query is
    /// rebuilt from this parameter set. Values are percent-encoded, so
    /// `EUR/USD` becomes `instrumento=EUR%2FUSD`.
    #[must_use]
    pub fn request_target(&self, base_url: &Url) -> Url {
        let mut url = base_url.clone();
        url.set_path(STREAM_PATH);
        url.set_query(None);
        url.query_pairs_mut()
            .append_pair("instrumento", &self.instrument)
            .append_pair("timeframe", &self.timeframe)
            .append_pair("tipo_setup", self.setup_type.as_str())
            .append_pair("gerar_imagem", bool_literal(self.generate_image))
            .append_pair("gerar_pdf", bool_literal(self.generate_pdf))
            .append_pair("provider", self.provider.as_str());
        url
    }
}

/// Encode a boolean as the literal query string the upstream expects.
const fn bool_literal(value: bool) -> &'static str {
    if value { "true" } else { "false" }
}
