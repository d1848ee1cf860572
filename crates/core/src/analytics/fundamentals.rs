use crate::domain::FundamentalMetrics;
use serde_json::Value;
use std::collections::BTreeMap;

/// Extracts the snapshot from a provider's raw key/value payload.
///
/// Provider keys follow the Yahoo-style names (`marketCap`, `trailingPE`,
/// `forwardPE`, `sector`); snake_case spellings are accepted as well.
pub fn snapshot(raw: &BTreeMap<String, Value>) -> FundamentalMetrics {
    FundamentalMetrics {
        market_cap: number(raw, &["marketCap", "market_cap"]),
        pe_ratio: number(raw, &["trailingPE", "pe_ratio"]),
        forward_pe: number(raw, &["forwardPE", "forward_pe"]),
        sector: text(raw, &["sector"]),
    }
}

fn lookup<'a>(raw: &'a BTreeMap<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|k| raw.get(*k))
        .find(|v| !v.is_null())
}

fn number(raw: &BTreeMap<String, Value>, keys: &[&str]) -> Option<f64> {
    let v = match lookup(raw, keys)? {
        Value::Number(n) => n.as_f64()?,
        // Some providers stringify numbers; "N/A" and friends fail to parse.
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    v.is_finite().then_some(v)
}

fn text(raw: &BTreeMap<String, Value>, keys: &[&str]) -> Option<String> {
    match lookup(raw, keys)? {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(v: Value) -> BTreeMap<String, Value> {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn extracts_complete_snapshot() {
        let m = snapshot(&raw(json!({
            "marketCap": 2.9e12,
            "trailingPE": 31.4,
            "forwardPE": 28.0,
            "sector": "Technology",
            "beta": 1.2
        })));
        assert_eq!(m.market_cap, Some(2.9e12));
        assert_eq!(m.pe_ratio, Some(31.4));
        assert_eq!(m.forward_pe, Some(28.0));
        assert_eq!(m.sector.as_deref(), Some("Technology"));
    }

    #[test]
    fn missing_fields_stay_absent_and_zero_is_kept() {
        let m = snapshot(&raw(json!({
            "marketCap": 0,
            "trailingPE": null,
            "forwardPE": "N/A"
        })));
        assert_eq!(m.market_cap, Some(0.0));
        assert_eq!(m.pe_ratio, None);
        assert_eq!(m.forward_pe, None);
        assert_eq!(m.sector, None);
    }

    #[test]
    fn accepts_snake_case_and_string_numbers() {
        let m = snapshot(&raw(json!({
            "market_cap": "1500000000",
            "pe_ratio": 12.5,
            "sector": "  "
        })));
        assert_eq!(m.market_cap, Some(1.5e9));
        assert_eq!(m.pe_ratio, Some(12.5));
        assert_eq!(m.sector, None);
    }

    #[test]
    fn empty_payload_yields_empty_snapshot() {
        assert_eq!(snapshot(&BTreeMap::new()), FundamentalMetrics::default());
    }
}
