//! Per-model price table.
//!
//! Rates are USD per million tokens, `(input, output)`. Lookup is exact
//! first, then longest matching prefix so dated model variants resolve
//! to their family. Unknown models cost 0.0.

/// `(model prefix, input $/1M, output $/1M)`
const PRICE_TABLE: &[(&str, f64, f64)] = &[
    // OpenAI — latest
    ("gpt-4.1-mini", 0.40, 1.60),
    ("gpt-4.1-nano", 0.10, 0.40),
    ("gpt-4.1", 2.00, 8.00),
    ("gpt-4o-mini", 0.15, 0.60),
    ("gpt-4o", 2.50, 10.00),
    ("o3-mini", 1.10, 4.40),
    ("o3", 2.00, 8.00),
    ("o4-mini", 1.10, 4.40),
    ("o1-mini", 3.00, 12.00),
    ("o1", 15.00, 60.00),
    // OpenAI — legacy
    ("gpt-4-turbo", 10.00, 30.00),
    ("gpt-4", 30.00, 60.00),
    ("gpt-3.5-turbo", 0.50, 1.50),
    // Anthropic — latest
    ("claude-opus-4", 5.00, 25.00),
    ("claude-sonnet-4", 3.00, 15.00),
    ("claude-haiku-4", 1.00, 5.00),
    // Anthropic — legacy
    ("claude-3-5-sonnet", 3.00, 15.00),
    ("claude-3-5-haiku", 1.00, 5.00),
    ("claude-3-opus", 15.00, 75.00),
    ("claude-3-haiku", 0.25, 1.25),
    // Google Gemini — latest
    ("gemini-2.5-pro", 1.25, 10.00),
    ("gemini-2.5-flash", 0.15, 0.60),
    ("gemini-2.0-flash-lite", 0.075, 0.30),
    ("gemini-2.0-flash", 0.10, 0.40),
    // Google Gemini — legacy
    ("gemini-1.5-pro", 1.25, 5.00),
    ("gemini-1.5-flash", 0.075, 0.30),
];

/// Look up the `(input, output)` per-million rates for a model.
fn rates_for(model: &str) -> Option<(f64, f64)> {
    if let Some(&(_, input, output)) = PRICE_TABLE.iter().find(|(m, _, _)| *m == model) {
        return Some((input, output));
    }
    PRICE_TABLE
        .iter()
        .filter(|(prefix, _, _)| model.starts_with(prefix))
        .max_by_key(|(prefix, _, _)| prefix.len())
        .map(|&(_, input, output)| (input, output))
}

/// Estimate the USD cost of one call. Unknown models return 0.0.
pub fn estimate_cost(model: &str, input_tokens: u32, output_tokens: u32) -> f64 {
    let Some((input_rate, output_rate)) = rates_for(model) else {
        return 0.0;
    };
    (input_tokens as f64 / 1_000_000.0) * input_rate
        + (output_tokens as f64 / 1_000_000.0) * output_rate
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_match_cost() {
        // 1M input + 1M output of gpt-4o-mini.
        let cost = estimate_cost("gpt-4o-mini", 1_000_000, 1_000_000);
        assert!((cost - 0.75).abs() < 1e-9);
    }

    #[test]
    fn dated_variant_resolves_by_prefix() {
        let cost = estimate_cost("claude-haiku-4-5-20251001", 1_000_000, 0);
        assert!((cost - 1.00).abs() < 1e-9);
    }

    #[test]
    fn longest_prefix_wins() {
        // "gpt-4o-mini-2024-07-18" must hit gpt-4o-mini, not gpt-4o.
        let mini = estimate_cost("gpt-4o-mini-2024-07-18", 1_000_000, 0);
        assert!((mini - 0.15).abs() < 1e-9);
        // "gpt-4-turbo-preview" must hit gpt-4-turbo, not gpt-4.
        let turbo = estimate_cost("gpt-4-turbo-preview", 1_000_000, 0);
        assert!((turbo - 10.00).abs() < 1e-9);
    }

    #[test]
    fn unknown_model_is_free() {
        assert_eq!(estimate_cost("mystery-model-9000", 5000, 5000), 0.0);
    }

    #[test]
    fn proportional_arithmetic() {
        // 10k input + 2k output of gpt-4o: 10e3/1e6*2.5 + 2e3/1e6*10.
        let cost = estimate_cost("gpt-4o", 10_000, 2_000);
        assert!((cost - (0.025 + 0.02)).abs() < 1e-9);
    }
}
