use std::str::FromStr;

use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PipelineMetrics {
    pub leads: usize,
    pub opportunities: usize,
    pub revenue: Decimal,
    pub conversion: u32,
}

impl PipelineMetrics {
    /// Builds dashboard metrics from a contacts payload (`{"contacts": [...]}`)
    /// and an opportunities payload (`{"opportunities": [...]}`). Missing or
    /// malformed payloads count as empty lists.
    pub fn from_payloads(contacts: Option<&Value>, opportunities: Option<&Value>) -> Self {
        let leads = list_field(contacts, "contacts").len();
        let opportunity_list = list_field(opportunities, "opportunities");

        let revenue = opportunity_list
            .iter()
            .filter(|opportunity| opportunity.get("status").and_then(Value::as_str) == Some("won"))
            .filter_map(|opportunity| opportunity.get("monetaryValue"))
            .filter_map(monetary_value)
            .sum();

        let opportunities = opportunity_list.len();
        Self { leads, opportunities, revenue, conversion: conversion_pct(leads, opportunities) }
    }
}

fn list_field<'a>(payload: Option<&'a Value>, key: &str) -> &'a [Value] {
    payload
        .and_then(|value| value.get(key))
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

fn monetary_value(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(number) => Decimal::from_str(&number.to_string())
            .ok()
            .or_else(|| number.as_f64().and_then(|float| Decimal::try_from(float).ok())),
        Value::String(text) => Decimal::from_str(text.trim()).ok(),
        _ => None,
    }
}

fn conversion_pct(leads: usize, opportunities: usize) -> u32 {
    if leads == 0 {
        return 0;
    }
    let ratio = (opportunities as f64 / leads as f64) * 100.0;
    ratio.round() as u32
}
