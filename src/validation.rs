//! Input checks run before anything is sent to the vectoriser.
//!
//! Each function returns the first violation found, so a request is either
//! fully valid or rejected whole.

use std::collections::HashSet;

use crate::cluster::{validate_cut, ClusterMethod};
use crate::errors::ValidationError;
use crate::model::Instrument;
use crate::pipeline::MatchRequest;

/// Unique instrument ids, non-blank texts, polarities of exactly `1` or `-1`.
///
/// Polarity errors report the item's position in the flattened order.
pub fn validate_instruments(instruments: &[Instrument]) -> Result<(), ValidationError> {
    let mut seen = HashSet::new();
    let mut position = 0;

    for instrument in instruments {
        if !seen.insert(instrument.id) {
            return Err(ValidationError::DuplicateInstrument(instrument.id));
        }

        for (index, item) in instrument.items.iter().enumerate() {
            if item.text.trim().is_empty() {
                return Err(ValidationError::EmptyText {
                    instrument_id: instrument.id,
                    index,
                });
            }
            if item.polarity != 1.0 && item.polarity != -1.0 {
                return Err(ValidationError::InvalidPolarity {
                    position,
                    value: item.polarity,
                });
            }
            position += 1;
        }
    }

    Ok(())
}

pub fn validate_query(query: &str) -> Result<(), ValidationError> {
    if query.trim().is_empty() {
        return Err(ValidationError::EmptyQuery);
    }
    Ok(())
}

pub fn validate_request(request: &MatchRequest) -> Result<(), ValidationError> {
    if request.top_k == 0 {
        return Err(ValidationError::NonPositiveTopK);
    }

    check_score("min_score", request.min_score)?;

    match &request.cluster {
        Some(ClusterMethod::Threshold { threshold }) => {
            check_score("cluster.threshold", *threshold)?
        }
        Some(ClusterMethod::Hierarchical { cut, .. }) => validate_cut(cut)?,
        None => {}
    }

    if let Some(crosswalk) = &request.crosswalk {
        check_score("crosswalk.threshold", crosswalk.threshold)?;
    }

    Ok(())
}

fn check_score(field: &'static str, value: f32) -> Result<(), ValidationError> {
    if !value.is_finite() || !(-1.0..=1.0).contains(&value) {
        return Err(ValidationError::InvalidScore { field, value });
    }
    Ok(())
}
