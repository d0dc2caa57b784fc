use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QueryClassification {
    #[serde(rename = "oportunidades")]
    Oportunidades,
    #[serde(rename = "leads")]
    Leads,
    #[serde(rename = "ventas")]
    Ventas,
    #[serde(rename = "ranking")]
    Ranking,
    #[serde(rename = "métricas")]
    Metricas,
    #[serde(rename = "propiedades")]
    Propiedades,
    #[serde(rename = "general")]
    General,
}

impl QueryClassification {
    pub fn label(self) -> &'static str {
        match self {
            Self::Oportunidades => "oportunidades",
            Self::Leads => "leads",
            Self::Ventas => "ventas",
            Self::Ranking => "ranking",
            Self::Metricas => "métricas",
            Self::Propiedades => "propiedades",
            Self::General => "general",
        }
    }
}

impl std::fmt::Display for QueryClassification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Rows are checked in order; the first row with a matching keyword wins.
/// Adding a label means adding a row here.
pub const CLASSIFICATION_KEYWORDS: &[(QueryClassification, &[&str])] = &[
    (QueryClassification::Oportunidades, &["oportunidad", "pipeline", "deal"]),
    (QueryClassification::Leads, &["lead", "contacto", "prospecto"]),
    (QueryClassification::Ventas, &["venta", "revenue", "ingreso"]),
    (QueryClassification::Ranking, &["mejor broker", "ranking"]),
    (QueryClassification::Metricas, &["métrica", "estadística", "kpi"]),
    (QueryClassification::Propiedades, &["lote", "propiedad", "amenidad"]),
];

/// Keyword classification of raw query text. Depends on nothing but `query`.
pub fn classify(query: &str) -> QueryClassification {
    let normalized = query.to_lowercase();

    CLASSIFICATION_KEYWORDS
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|keyword| normalized.contains(keyword)))
        .map(|(classification, _)| *classification)
        .unwrap_or(QueryClassification::General)
}
