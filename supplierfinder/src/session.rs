//! Per-search state: the admitted companies in discovery order, the id
//! counter and run statistics.

use indexmap::IndexMap;
use serde::Serialize;
use std::collections::HashSet;
use tracing::{debug, info};

use crate::company::{CandidateCompany, CandidateId, PartialCandidate};

/// Counters reported at the end of a search
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    pub pages_fetched: u32,
    pub urls_visited: usize,
    pub pages_without_data: usize,
    pub rejected: usize,
    pub duplicates_suppressed: usize,
}

#[derive(Debug)]
pub struct SearchSession {
    companies: IndexMap<CandidateId, CandidateCompany>,
    next_id: CandidateId,
    seen_websites: HashSet<String>,
    seen_names: HashSet<String>,
    stats: SessionStats,
}

impl Default for SearchSession {
    fn default() -> Self {
        Self::new()
    }
}

impl SearchSession {
    pub fn new() -> Self {
        Self {
            companies: IndexMap::new(),
            next_id: CandidateId::FIRST,
            seen_websites: HashSet::new(),
            seen_names: HashSet::new(),
            stats: SessionStats::default(),
        }
    }

    /// Merge one extracted record into the session.
    ///
    /// Returns the new id, or `None` when the record lacks a legal name or a
    /// valid INN, or repeats the website or legal name of an admitted company.
    /// Only admitted records consume an id.
    pub fn admit(&mut self, partial: PartialCandidate, website: &str) -> Option<CandidateId> {
        let company = match CandidateCompany::from_partial(self.next_id, partial, website) {
            Ok(company) => company,
            Err(reason) => {
                debug!("Rejected record from {}: {}", website, reason);
                self.stats.rejected += 1;
                return None;
            }
        };

        if self.seen_websites.contains(&company.website) {
            debug!("Duplicate website {}, keeping first-seen company", company.website);
            self.stats.duplicates_suppressed += 1;
            return None;
        }
        if self.seen_names.contains(&company.legal_name) {
            debug!(
                "Duplicate legal name {:?} at {}, keeping first-seen company",
                company.legal_name, company.website
            );
            self.stats.duplicates_suppressed += 1;
            return None;
        }

        let id = company.id;
        info!("Admitted {}: {} (INN {}) from {}", id, company.legal_name, company.inn, company.website);
        self.seen_websites.insert(company.website.clone());
        self.seen_names.insert(company.legal_name.clone());
        self.companies.insert(id, company);
        self.next_id = id.next();
        Some(id)
    }

    pub fn record_page_fetched(&mut self) {
        self.stats.pages_fetched += 1;
    }

    pub fn record_url_visited(&mut self, yielded_data: bool) {
        self.stats.urls_visited += 1;
        if !yielded_data {
            self.stats.pages_without_data += 1;
        }
    }

    pub fn len(&self) -> usize {
        self.companies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.companies.is_empty()
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    pub fn into_companies(self) -> IndexMap<CandidateId, CandidateCompany> {
        self.companies
    }
}
