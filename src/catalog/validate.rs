use std::collections::BTreeSet;

use thiserror::Error;

use super::models::GalleryRecord;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Gallery ID is required")]
    MissingId,
    #[error("Gallery ID '{0}' may only contain lowercase letters, digits and hyphens")]
    MalformedId(String),
    #[error("Gallery name is required")]
    MissingName,
    #[error("Gallery ID '{0}' is already in use")]
    DuplicateId(String),
    #[error("Please fill in ID and Name for all galleries. {0} gallery(ies) are incomplete.")]
    Incomplete(usize),
    #[error("Duplicate gallery IDs found: {}. Please use unique IDs.", .0.join(", "))]
    DuplicateIds(Vec<String>),
}

/// `^[a-z0-9-]+$`
pub fn validate_gallery_id(id: &str) -> Result<(), ValidationError> {
    if id.is_empty() {
        return Err(ValidationError::MissingId);
    }
    let well_formed = id
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    if !well_formed {
        return Err(ValidationError::MalformedId(id.to_string()));
    }
    Ok(())
}

pub fn validate_gallery(record: &GalleryRecord) -> Result<(), ValidationError> {
    validate_gallery_id(&record.id)?;
    if record.name.trim().is_empty() {
        return Err(ValidationError::MissingName);
    }
    Ok(())
}

/// Check a whole gallery list before it is written.
pub fn validate_gallery_list(galleries: &[GalleryRecord]) -> Result<(), ValidationError> {
    let incomplete = galleries
        .iter()
        .filter(|g| g.id.is_empty() || g.name.trim().is_empty())
        .count();
    if incomplete > 0 {
        return Err(ValidationError::Incomplete(incomplete));
    }

    for gallery in galleries {
        validate_gallery_id(&gallery.id)?;
    }

    let mut seen = BTreeSet::new();
    let mut duplicates = BTreeSet::new();
    for gallery in galleries {
        let id = gallery.id.to_lowercase();
        if !seen.insert(id.clone()) {
            duplicates.insert(id);
        }
    }
    if !duplicates.is_empty() {
        return Err(ValidationError::DuplicateIds(duplicates.into_iter().collect()));
    }

    Ok(())
}
