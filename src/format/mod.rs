//! pt-BR number rendering for dashboard fields.

pub const DEFAULT_CURRENCY_SYMBOL: &str = "R$";
pub const TEXT_PLACEHOLDER: &str = "-";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CurrencyFormat {
    pub symbol: String,
    pub decimals: u8,
}

impl Default for CurrencyFormat {
    fn default() -> Self {
        Self {
            symbol: DEFAULT_CURRENCY_SYMBOL.to_string(),
            decimals: 0,
        }
    }
}

impl CurrencyFormat {
    pub fn with_decimals(decimals: u8) -> Self {
        Self {
            decimals,
            ..Self::default()
        }
    }

    /// The fixed text written for a falsy amount, regardless of `decimals`.
    pub fn zero_placeholder(&self) -> String {
        format!("{} 0", self.symbol)
    }

    /// `Some(38621924.56)` renders as `R$ 38.621.925` with zero decimals.
    /// `None`, zero, and non-finite amounts render as [`Self::zero_placeholder`].
    pub fn money(&self, value: Option<f64>) -> String {
        let Some(v) = truthy(value) else {
            return self.zero_placeholder();
        };
        let (negative, body) = fixed_grouped(v, self.decimals);
        if negative {
            format!("-{} {}", self.symbol, body)
        } else {
            format!("{} {}", self.symbol, body)
        }
    }
}

/// Grouped integer (`1.204`), falsy values render as `0`.
pub fn count(value: Option<f64>) -> String {
    let Some(v) = truthy(value) else {
        return "0".to_string();
    };
    let (negative, body) = fixed_grouped(v, 0);
    if negative {
        format!("-{body}")
    } else {
        body
    }
}

pub fn text(value: Option<&str>) -> String {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => TEXT_PLACEHOLDER.to_string(),
    }
}

pub fn escape_html(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

fn truthy(value: Option<f64>) -> Option<f64> {
    value.filter(|v| *v != 0.0 && v.is_finite())
}

// Rounds half away from zero to `decimals` places and groups with `.`,
// using `,` as the decimal separator. Returns (is_negative, digits).
fn fixed_grouped(value: f64, decimals: u8) -> (bool, String) {
    let decimals = decimals.min(6);
    let scale = 10u128.pow(u32::from(decimals));
    let scaled = (value.abs() * scale as f64).round() as u128;
    let int_part = scaled / scale;
    let frac_part = scaled % scale;

    let mut out = group_thousands(int_part);
    if decimals > 0 {
        out.push(',');
        out.push_str(&format!("{:0width$}", frac_part, width = decimals as usize));
    }
    (value < 0.0 && scaled != 0, out)
}

fn group_thousands(value: u128) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push('.');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn money_rounds_to_whole_reais() {
        let fmt = CurrencyFormat::default();
        assert_eq!(fmt.money(Some(38621924.56)), "R$ 38.621.925");
        assert_eq!(fmt.money(Some(999.5)), "R$ 1.000");
        assert_eq!(fmt.money(Some(12.0)), "R$ 12");
    }

    #[test]
    fn money_with_cents() {
        let fmt = CurrencyFormat::with_decimals(2);
        assert_eq!(fmt.money(Some(38621924.56)), "R$ 38.621.924,56");
        assert_eq!(fmt.money(Some(0.5)), "R$ 0,50");
        assert_eq!(fmt.money(Some(-3599009.10)), "-R$ 3.599.009,10");
    }

    #[test]
    fn falsy_money_uses_placeholder() {
        let fmt = CurrencyFormat::default();
        assert_eq!(fmt.money(None), "R$ 0");
        assert_eq!(fmt.money(Some(0.0)), "R$ 0");
        assert_eq!(fmt.money(Some(f64::NAN)), "R$ 0");
        assert_eq!(CurrencyFormat::with_decimals(2).money(None), "R$ 0");
    }

    #[test]
    fn negative_money_keeps_sign_before_symbol() {
        let fmt = CurrencyFormat::default();
        assert_eq!(fmt.money(Some(-3599009.10)), "-R$ 3.599.009");
        assert_eq!(fmt.money(Some(-0.2)), "R$ 0");
    }

    #[test]
    fn counts_and_text() {
        assert_eq!(count(Some(142.0)), "142");
        assert_eq!(count(Some(1204.0)), "1.204");
        assert_eq!(count(None), "0");
        assert_eq!(text(Some(" Regular ")), "Regular");
        assert_eq!(text(Some("")), "-");
        assert_eq!(escape_html("<b>P&L</b>"), "&lt;b&gt;P&amp;L&lt;/b&gt;");
    }
}
