// ─────────────────────────────────────────────────────────────────────
// SynthECG — Standard 12-Lead Layout
// ─────────────────────────────────────────────────────────────────────
//! Lead ordering shared by the projector, the generator and persisted
//! arrays: `[I, II, III, aVR, aVL, aVF, V1..V6]`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{SynthEcgError, SynthEcgResult};

pub const N_LEADS: usize = 12;

/// One of the twelve standard ECG leads.
#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Lead {
    I,
    II,
    III,
    #[serde(rename = "aVR")]
    AVR,
    #[serde(rename = "aVL")]
    AVL,
    #[serde(rename = "aVF")]
    AVF,
    V1,
    V2,
    V3,
    V4,
    V5,
    V6,
}

impl Lead {
    /// All leads in output column order.
    pub const ALL: [Lead; N_LEADS] = [
        Lead::I,
        Lead::II,
        Lead::III,
        Lead::AVR,
        Lead::AVL,
        Lead::AVF,
        Lead::V1,
        Lead::V2,
        Lead::V3,
        Lead::V4,
        Lead::V5,
        Lead::V6,
    ];

    /// Column of this lead in a projected 12-lead row.
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Lead::I => "I",
            Lead::II => "II",
            Lead::III => "III",
            Lead::AVR => "aVR",
            Lead::AVL => "aVL",
            Lead::AVF => "aVF",
            Lead::V1 => "V1",
            Lead::V2 => "V2",
            Lead::V3 => "V3",
            Lead::V4 => "V4",
            Lead::V5 => "V5",
            Lead::V6 => "V6",
        }
    }
}

impl fmt::Display for Lead {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Lead {
    type Err = SynthEcgError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Lead::ALL
            .iter()
            .copied()
            .find(|lead| lead.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| SynthEcgError::Config(format!("unknown lead name '{s}'")))
    }
}

/// Which projected leads end up in a saved sample.
///
/// `First(n)` keeps the first `n` columns; `Named` keeps the listed
/// leads in the listed order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LeadSelection {
    First(usize),
    Named(Vec<Lead>),
}

impl LeadSelection {
    /// Resolve to column indices into a 12-lead row.
    pub fn indices(&self) -> SynthEcgResult<Vec<usize>> {
        match self {
            LeadSelection::First(n) => {
                if *n == 0 || *n > N_LEADS {
                    return Err(SynthEcgError::Config(format!(
                        "lead count must be in [1, {N_LEADS}], got {n}"
                    )));
                }
                Ok((0..*n).collect())
            }
            LeadSelection::Named(leads) => {
                if leads.is_empty() {
                    return Err(SynthEcgError::Config(
                        "lead selection must name at least one lead".to_string(),
                    ));
                }
                let mut seen = [false; N_LEADS];
                for lead in leads {
                    if std::mem::replace(&mut seen[lead.index()], true) {
                        return Err(SynthEcgError::Config(format!(
                            "lead {lead} selected more than once"
                        )));
                    }
                }
                Ok(leads.iter().map(|lead| lead.index()).collect())
            }
        }
    }
}

/// Column indices for an optional selection (`None` = all twelve).
pub fn resolve_leads(selection: Option<&LeadSelection>) -> SynthEcgResult<Vec<usize>> {
    match selection {
        Some(sel) => sel.indices(),
        None => Ok((0..N_LEADS).collect()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lead_order() {
        assert_eq!(Lead::I.index(), 0);
        assert_eq!(Lead::AVR.index(), 3);
        assert_eq!(Lead::V1.index(), 6);
        assert_eq!(Lead::V6.index(), 11);
        for (i, lead) in Lead::ALL.iter().enumerate() {
            assert_eq!(lead.index(), i);
        }
    }

    #[test]
    fn test_from_str_case_insensitive() {
        assert_eq!("avf".parse::<Lead>().unwrap(), Lead::AVF);
        assert_eq!(" V3 ".parse::<Lead>().unwrap(), Lead::V3);
        assert!("V7".parse::<Lead>().is_err());
    }

    #[test]
    fn test_selection_first_n() {
        let sel = LeadSelection::First(3);
        assert_eq!(sel.indices().unwrap(), vec![0, 1, 2]);
        assert!(LeadSelection::First(0).indices().is_err());
        assert!(LeadSelection::First(13).indices().is_err());
    }

    #[test]
    fn test_selection_named_keeps_order() {
        let sel = LeadSelection::Named(vec![Lead::V1, Lead::II]);
        assert_eq!(sel.indices().unwrap(), vec![6, 1]);
    }

    #[test]
    fn test_selection_rejects_duplicates() {
        let sel = LeadSelection::Named(vec![Lead::V1, Lead::V1]);
        assert!(sel.indices().is_err());
        assert!(LeadSelection::Named(vec![]).indices().is_err());
    }

    #[test]
    fn test_selection_serde_untagged() {
        let sel: LeadSelection = serde_json::from_str("4").unwrap();
        assert_eq!(sel, LeadSelection::First(4));
        let sel: LeadSelection = serde_json::from_str(r#"["I", "aVL", "V5"]"#).unwrap();
        assert_eq!(
            sel,
            LeadSelection::Named(vec![Lead::I, Lead::AVL, Lead::V5])
        );
    }

    #[test]
    fn test_resolve_default_all() {
        assert_eq!(resolve_leads(None).unwrap().len(), N_LEADS);
    }
}
