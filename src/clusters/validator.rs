//! Rules for turning raw annotation fragments into tags and spans.

use super::{Category, CategoryTag, Span};

/// Why a `category:weight` pair was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagRejection {
    EmptyCategory,
    MissingWeight,
    NonNumericWeight,
    NonFiniteWeight,
}

/// Validate one raw `category:weight` pair, split on the first `:`.
pub fn validate_pair(pair: &str) -> Result<CategoryTag, TagRejection> {
    match pair.split_once(':') {
        Some((category, weight)) => validate_tag(category, weight),
        None => {
            if pair.trim().is_empty() {
                Err(TagRejection::EmptyCategory)
            } else {
                Err(TagRejection::MissingWeight)
            }
        }
    }
}

/// Validate an already-split category and weight. Both sides are trimmed.
///
/// The weight is the longest decimal number at the start of the token, so
/// `0.5 (moderate)` reads as `0.5`. NaN and infinities are rejected.
pub fn validate_tag(category: &str, weight: &str) -> Result<CategoryTag, TagRejection> {
    let category = Category::new(category).ok_or(TagRejection::EmptyCategory)?;
    let weight = weight.trim();
    if weight.is_empty() {
        return Err(TagRejection::MissingWeight);
    }
    let Some(number) = leading_number(weight) else {
        return Err(if names_non_finite(weight) {
            TagRejection::NonFiniteWeight
        } else {
            TagRejection::NonNumericWeight
        });
    };
    let value: f64 = number
        .parse()
        .map_err(|_| TagRejection::NonNumericWeight)?;
    CategoryTag::new(category, value).ok_or(TagRejection::NonFiniteWeight)
}

/// A parsed record becomes a span only with non-empty text and at least one tag.
pub fn validate_span(text: &str, tags: Vec<CategoryTag>) -> Option<Span> {
    if tags.is_empty() {
        return None;
    }
    Span::new(text, tags)
}

/// `[+-]? digits? ('.' digits?)? ([eE] [+-]? digits)?` with at least one
/// mantissa digit. The exponent is only taken when it has digits.
fn leading_number(token: &str) -> Option<&str> {
    let bytes = token.as_bytes();
    let digits_from = |mut i: usize| {
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        i
    };

    let mut end = usize::from(matches!(bytes.first(), Some(b'+' | b'-')));
    let int_end = digits_from(end);
    let mut mantissa_digits = int_end - end;
    end = int_end;

    if bytes.get(end) == Some(&b'.') {
        let frac_end = digits_from(end + 1);
        let frac_digits = frac_end - (end + 1);
        if mantissa_digits + frac_digits > 0 {
            mantissa_digits += frac_digits;
            end = frac_end;
        }
    }
    if mantissa_digits == 0 {
        return None;
    }

    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exp = end + 1;
        if matches!(bytes.get(exp), Some(b'+' | b'-')) {
            exp += 1;
        }
        let exp_end = digits_from(exp);
        if exp_end > exp {
            end = exp_end;
        }
    }
    Some(&token[..end])
}

fn names_non_finite(token: &str) -> bool {
    let unsigned = token.trim_start_matches(['+', '-']).to_ascii_lowercase();
    unsigned.starts_with("nan") || unsigned.starts_with("inf")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pair_is_split_on_first_colon_and_trimmed() {
        let tag = validate_pair("  confirmation_bias :  0.75 ").unwrap();
        assert_eq!(tag.category().as_str(), "confirmation_bias");
        assert_eq!(tag.weight(), 0.75);

        // the weight token is "1:2", whose leading number is 1
        assert_eq!(validate_pair("a:1:2").unwrap().weight(), 1.0);
    }

    #[test]
    fn rejection_reasons() {
        assert_eq!(validate_pair("no_colon"), Err(TagRejection::MissingWeight));
        assert_eq!(validate_pair("cat:"), Err(TagRejection::MissingWeight));
        assert_eq!(validate_pair(":0.5"), Err(TagRejection::EmptyCategory));
        assert_eq!(validate_pair(""), Err(TagRejection::EmptyCategory));
        assert_eq!(validate_pair("x:high"), Err(TagRejection::NonNumericWeight));
        assert_eq!(validate_pair("x:."), Err(TagRejection::NonNumericWeight));
        assert_eq!(validate_pair("x:-"), Err(TagRejection::NonNumericWeight));
        assert_eq!(validate_pair("x:NaN"), Err(TagRejection::NonFiniteWeight));
        assert_eq!(validate_pair("x:inf"), Err(TagRejection::NonFiniteWeight));
        assert_eq!(validate_pair("x:-Infinity"), Err(TagRejection::NonFiniteWeight));
        assert_eq!(validate_pair("x:1e999"), Err(TagRejection::NonFiniteWeight));
    }

    #[test]
    fn integer_and_exponent_weights_parse() {
        assert_eq!(validate_pair("x:1").unwrap().weight(), 1.0);
        assert_eq!(validate_pair("x:2.5e-1").unwrap().weight(), 0.25);
        assert_eq!(validate_pair("x:+.5").unwrap().weight(), 0.5);
        assert_eq!(validate_pair("x:-3.").unwrap().weight(), -3.0);
    }

    #[test]
    fn trailing_text_after_weight_is_ignored() {
        assert_eq!(validate_pair("x:0.5 (moderate)").unwrap().weight(), 0.5);
        assert_eq!(validate_pair("x:0.5)").unwrap().weight(), 0.5);
        assert_eq!(validate_pair("x:0.8.").unwrap().weight(), 0.8);
        assert_eq!(validate_pair("x:0.7abc").unwrap().weight(), 0.7);
        // an exponent marker without digits is not part of the number
        assert_eq!(validate_pair("x:2e").unwrap().weight(), 2.0);
        assert_eq!(validate_pair("x:2e+").unwrap().weight(), 2.0);
    }

    #[test]
    fn leading_number_bounds() {
        assert_eq!(leading_number("12.5e3xyz"), Some("12.5e3"));
        assert_eq!(leading_number("-0.25,"), Some("-0.25"));
        assert_eq!(leading_number(".e5"), None);
        assert_eq!(leading_number("abc"), None);
    }

    #[test]
    fn span_needs_text_and_tags() {
        let tag = validate_pair("x:1").unwrap();
        assert!(validate_span("   ", vec![tag.clone()]).is_none());
        assert!(validate_span("text", vec![]).is_none());
        assert_eq!(validate_span(" text ", vec![tag]).unwrap().text(), "text");
    }
}
