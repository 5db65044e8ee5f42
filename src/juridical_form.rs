//! Buckets raw legal-form codes into the handful of business forms people
//! search for. A form code and its label can carry markers of several
//! buckets at once, so the rule order is part of the behavior.

pub const UNKNOWN_FORM: &str = "Onbekend";

const NATURAL_PERSON_MARKER: &str = "NATUURL";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormBucket {
    Eenmanszaak,
    Bv,
    Nv,
    Cv,
    CommV,
    Vzw,
    Stichting,
}

impl FormBucket {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Eenmanszaak => "Eenmanszaak",
            Self::Bv => "BV",
            Self::Nv => "NV",
            Self::Cv => "CV",
            Self::CommV => "CommV",
            Self::Vzw => "VZW",
            Self::Stichting => "Stichting",
        }
    }
}

struct Rule {
    markers: &'static [&'static str],
    bucket: FormBucket,
}

/// Evaluated top-down against `"{form} {label}"`; first hit wins.
const RULES: &[Rule] = &[
    Rule {
        markers: &["EENMANS", NATURAL_PERSON_MARKER],
        bucket: FormBucket::Eenmanszaak,
    },
    Rule {
        markers: &["BVBA", "B.V.B.A", "BV"],
        bucket: FormBucket::Bv,
    },
    Rule {
        markers: &["NV"],
        bucket: FormBucket::Nv,
    },
    Rule {
        markers: &["CVBA", "C.V.B.A", "CV"],
        bucket: FormBucket::Cv,
    },
    Rule {
        markers: &["COMM.V", "COMMAND"],
        bucket: FormBucket::CommV,
    },
    Rule {
        markers: &["VZW", "VERENIGING ZONDER WINST", "ASBL"],
        bucket: FormBucket::Vzw,
    },
    Rule {
        markers: &["STICHTING", "FONDATION"],
        bucket: FormBucket::Stichting,
    },
];

fn normalized(value: Option<&str>) -> String {
    value.unwrap_or_default().to_uppercase()
}

pub fn classify_bucket(
    raw_form: Option<&str>,
    type_of_enterprise: Option<&str>,
    form_label: Option<&str>,
    type_label: Option<&str>,
) -> Option<FormBucket> {
    let raw = normalized(raw_form);
    let label = normalized(form_label);
    let enterprise_type = normalized(type_of_enterprise);
    let type_label = normalized(type_label);

    if raw.is_empty()
        && label.is_empty()
        && (enterprise_type.contains(NATURAL_PERSON_MARKER)
            || type_label.contains(NATURAL_PERSON_MARKER))
    {
        return Some(FormBucket::Eenmanszaak);
    }

    let haystack = format!("{raw} {label}");
    RULES
        .iter()
        .find(|rule| rule.markers.iter().any(|marker| haystack.contains(marker)))
        .map(|rule| rule.bucket)
}

/// Bucket name, else the uppercased raw form, else the uppercased label,
/// else [`UNKNOWN_FORM`].
pub fn classify_juridical_form(
    raw_form: Option<&str>,
    type_of_enterprise: Option<&str>,
    form_label: Option<&str>,
    type_label: Option<&str>,
) -> String {
    if let Some(bucket) = classify_bucket(raw_form, type_of_enterprise, form_label, type_label) {
        return bucket.as_str().to_string();
    }

    [normalized(raw_form), normalized(form_label)]
        .into_iter()
        .find(|value| !value.is_empty())
        .unwrap_or_else(|| UNKNOWN_FORM.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_legacy_and_current_abbreviations() {
        assert_eq!(classify_juridical_form(Some("BVBA"), None, None, None), "BV");
        assert_eq!(classify_juridical_form(Some("bv"), None, None, None), "BV");
        assert_eq!(classify_juridical_form(Some("VZW"), None, None, None), "VZW");
        assert_eq!(classify_juridical_form(Some("ASBL"), None, None, None), "VZW");
        assert_eq!(classify_juridical_form(Some("NV"), None, None, None), "NV");
        assert_eq!(classify_juridical_form(Some("Comm.V"), None, None, None), "CommV");
        assert_eq!(
            classify_juridical_form(Some("Fondation privée"), None, None, None),
            "Stichting"
        );
    }

    #[test]
    fn natural_person_type_wins_when_form_is_missing() {
        assert_eq!(
            classify_juridical_form(None, Some("NATUURLIJK PERSOON"), None, None),
            "Eenmanszaak"
        );
        assert_eq!(
            classify_juridical_form(None, Some("1"), None, Some("Natuurlijk persoon")),
            "Eenmanszaak"
        );
    }

    #[test]
    fn label_is_searched_when_code_is_numeric() {
        assert_eq!(
            classify_juridical_form(
                Some("014"),
                Some("2"),
                Some("Naamloze vennootschap (NV)"),
                Some("Rechtspersoon")
            ),
            "NV"
        );
        assert_eq!(
            classify_juridical_form(
                Some("017"),
                None,
                Some("Vereniging zonder winstoogmerk"),
                None
            ),
            "VZW"
        );
    }

    #[test]
    fn rule_order_resolves_overlapping_markers() {
        assert_eq!(classify_juridical_form(Some("NV BVBA"), None, None, None), "BV");
        assert_eq!(classify_juridical_form(Some("CVBA"), None, None, None), "CV");
        assert_eq!(
            classify_juridical_form(Some("CV"), None, Some("Naamloze vennootschap NV"), None),
            "NV"
        );
        assert_eq!(
            classify_juridical_form(Some("EENMANSZAAK BV"), None, None, None),
            "Eenmanszaak"
        );
    }

    #[test]
    fn falls_back_to_raw_then_label_then_unknown() {
        assert_eq!(classify_juridical_form(Some("xyz"), None, None, None), "XYZ");
        assert_eq!(
            classify_juridical_form(None, None, Some("Europees economisch samenwerkingsverband"), None),
            "EUROPEES ECONOMISCH SAMENWERKINGSVERBAND"
        );
        assert_eq!(classify_juridical_form(None, None, None, None), UNKNOWN_FORM);
        assert_eq!(classify_juridical_form(Some("999"), None, None, None), "999");
    }
}
