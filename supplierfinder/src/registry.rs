//! Company registry enrichment.
//!
//! For a validated INN the registry serves three reports:
//! - the extended report: registration, management, activities, contacts,
//!   finances and risk indices
//! - the risks report, read for self-regulatory organization membership
//! - the license list
//!
//! They are merged into one [`CompanyProfile`]. Only the extended report is
//! required; the other two fill in what they can. Profiles then drive two
//! steps over a finished search: back-filling missing contacts and keeping
//! only the companies that meet the configured criteria.

use futures::stream::{self, StreamExt};
use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::company::CandidateId;
use crate::config::{CriteriaConfig, RegistryConfig};
use crate::export::Companies;
use crate::inn::validate_inn;

const EXTENDED_REPORT: &str = "GetCompanyExtendedReport";
const RISKS_REPORT: &str = "GetCompanySparkRisksReportXML";
const LICENSES_REPORT: &str = "GetCompanyLicenses";

const INCOME_STATEMENT_FORM: &str = "Отчет о финансовых результатах";
const REVENUE_CODE: &str = "2110";
const NET_PROFIT_CODE: &str = "2400";

/// Registry lookups in flight at once when profiling a result set
const LOOKUP_CONCURRENCY: usize = 4;

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("INN {0} fails checksum validation")]
    InvalidInn(String),

    #[error("Registry request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Registry returned HTTP {0}")]
    Status(reqwest::StatusCode),

    #[error("Registry response could not be decoded: {0}")]
    Decode(#[from] serde_json::Error),
}

/// The registry sends a lone element as an object and several as an array
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> OneOrMany<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::Many(items) => items,
            OneOrMany::One(item) => vec![item],
        }
    }
}

fn many<T>(value: Option<OneOrMany<T>>) -> Vec<T> {
    value.map(OneOrMany::into_vec).unwrap_or_default()
}

/// Text of a scalar or of an element's `#text`
fn text_of(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        Value::Number(n) => Some(n.to_string()),
        Value::Object(map) => map.get("#text").and_then(text_of),
        _ => None,
    }
}

/// Numeric value of a scalar or of an element's `#text`. Spaces and a
/// decimal comma are accepted; placeholders such as "Нет данных" are not.
fn number_of(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .replace(',', ".")
            .parse()
            .ok(),
        Value::Object(map) => map.get("#text").and_then(number_of),
        _ => None,
    }
}

fn attribute<'a>(element: Option<&'a Value>, name: &str) -> Option<&'a Value> {
    element?.get(name)
}

/// `@Description` of an element, or the element's own text
fn description_of(value: &Value) -> Option<String> {
    value
        .get("@Description")
        .and_then(text_of)
        .or_else(|| text_of(value))
}

#[derive(Debug, Deserialize)]
struct ExtendedReport {
    #[serde(rename = "INN")]
    inn: Option<Value>,
    #[serde(rename = "OGRN")]
    ogrn: Option<Value>,
    #[serde(rename = "ShortNameRus")]
    short_name: Option<String>,
    #[serde(rename = "FullNameRus")]
    full_name: Option<String>,
    #[serde(rename = "RegistrationDate")]
    registration_date: Option<String>,
    #[serde(rename = "Status")]
    status: Option<Value>,
    #[serde(rename = "CompanySize")]
    company_size: Option<Value>,
    #[serde(rename = "StaffNumberFTS")]
    staff: Option<StaffNumber>,
    #[serde(rename = "LegalAddressFTS")]
    address: Option<Value>,
    #[serde(rename = "LeaderList")]
    leaders: Option<LeaderList>,
    #[serde(rename = "OKVED2List")]
    activities: Option<OkvedList>,
    #[serde(rename = "SROMembership")]
    sro_membership: Option<SroList>,
    #[serde(rename = "PhoneList")]
    phones: Option<PhoneList>,
    #[serde(rename = "Www")]
    website: Option<Value>,
    #[serde(rename = "Finance")]
    finance: Option<Finance>,
    #[serde(rename = "ConsolidatedIndicator")]
    consolidated_indicator: Option<Value>,
    #[serde(rename = "FailureScore")]
    failure_score: Option<Value>,
    #[serde(rename = "IndexOfDueDiligence")]
    due_diligence: Option<Value>,
    #[serde(rename = "IPD")]
    payment_index: Option<Value>,
    #[serde(rename = "ExecutionProceedings")]
    execution_proceedings: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct StaffNumber {
    #[serde(rename = "Number")]
    number: Option<OneOrMany<Value>>,
}

#[derive(Debug, Deserialize)]
struct LeaderList {
    #[serde(rename = "Leader")]
    leader: Option<OneOrMany<Leader>>,
}

#[derive(Debug, Deserialize)]
struct Leader {
    #[serde(rename = "@FIO")]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OkvedList {
    #[serde(rename = "OKVED")]
    okved: Option<OneOrMany<Okved>>,
}

#[derive(Debug, Deserialize)]
struct Okved {
    #[serde(rename = "@Name")]
    name: Option<String>,
    #[serde(rename = "@IsMain")]
    is_main: Option<Value>,
}

impl Okved {
    fn is_main(&self) -> bool {
        match &self.is_main {
            Some(Value::Bool(flag)) => *flag,
            Some(Value::String(flag)) => flag.eq_ignore_ascii_case("true"),
            _ => false,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SroList {
    #[serde(rename = "SRO")]
    sro: Option<OneOrMany<RawSro>>,
}

#[derive(Debug, Deserialize)]
struct RawSro {
    #[serde(rename = "Name")]
    name: Option<String>,
    #[serde(rename = "Type")]
    kind: Option<String>,
    #[serde(rename = "RegistrationDate")]
    registration_date: Option<String>,
    #[serde(rename = "TerminationDate")]
    termination_date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PhoneList {
    #[serde(rename = "Phone")]
    phone: Option<OneOrMany<Value>>,
}

#[derive(Debug, Deserialize)]
struct Finance {
    #[serde(rename = "FinPeriod")]
    periods: Option<OneOrMany<FinPeriod>>,
}

#[derive(Debug, Deserialize)]
struct FinPeriod {
    #[serde(rename = "@PeriodName")]
    name: Option<Value>,
    #[serde(rename = "StringList")]
    lines: Option<FinLineList>,
}

#[derive(Debug, Deserialize)]
struct FinLineList {
    #[serde(rename = "String")]
    line: Option<OneOrMany<FinLine>>,
}

#[derive(Debug, Deserialize)]
struct FinLine {
    #[serde(rename = "@Form")]
    form: Option<String>,
    #[serde(rename = "@Code")]
    code: Option<Value>,
    #[serde(rename = "@Value")]
    value: Option<Value>,
}

/// Risks report. Membership arrives either wrapped in `SROs` or as a bare
/// `SRO` element.
#[derive(Debug, Deserialize)]
struct RisksReport {
    #[serde(rename = "SROs")]
    sros: Option<SroList>,
    #[serde(rename = "SRO")]
    sro: Option<OneOrMany<RawSro>>,
}

impl RisksReport {
    fn sro_name(self) -> Option<String> {
        let listed = self.sros.and_then(|list| list.sro).or(self.sro);
        many(listed).into_iter().find_map(|sro| sro.name)
    }
}

#[derive(Debug, Deserialize)]
struct LicensesReport {
    #[serde(rename = "INN")]
    inn: Option<String>,
    #[serde(rename = "OGRN")]
    ogrn: Option<String>,
    #[serde(rename = "ShortName")]
    short_name: Option<String>,
    #[serde(rename = "EGRULLikvidation")]
    liquidation_status: Option<String>,
    #[serde(rename = "ActivityKind")]
    activity_kind: Option<String>,
    #[serde(rename = "Licenses")]
    licenses: Option<LicenseContainer>,
}

#[derive(Debug, Deserialize)]
struct LicenseContainer {
    #[serde(rename = "License")]
    license: Option<OneOrMany<RawLicense>>,
}

#[derive(Debug, Deserialize)]
struct RawLicense {
    #[serde(rename = "Number")]
    number: Option<String>,
    #[serde(rename = "ActivityKind")]
    activity: Option<String>,
    #[serde(rename = "CurrentStatus")]
    status: Option<String>,
    #[serde(rename = "IssueDate")]
    issue_date: Option<String>,
    #[serde(rename = "EndDate")]
    end_date: Option<String>,
    #[serde(rename = "IssuingAuthority")]
    issuing_authority: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct License {
    pub number: Option<String>,
    pub activity: Option<String>,
    pub status: Option<String>,
    pub issue_date: Option<String>,
    pub end_date: Option<String>,
    pub issuing_authority: Option<String>,
}

impl From<RawLicense> for License {
    fn from(raw: RawLicense) -> Self {
        License {
            number: raw.number,
            activity: raw.activity,
            status: raw.status,
            issue_date: raw.issue_date,
            end_date: raw.end_date,
            issuing_authority: raw.issuing_authority,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SroMembership {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub registration_date: Option<String>,
    pub termination_date: Option<String>,
}

impl From<RawSro> for SroMembership {
    fn from(raw: RawSro) -> Self {
        SroMembership {
            name: raw.name,
            kind: raw.kind,
            registration_date: raw.registration_date,
            termination_date: raw.termination_date,
        }
    }
}

/// Everything the registry knows about one company
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CompanyProfile {
    pub inn: Option<String>,
    pub ogrn: Option<String>,
    pub legal_name: Option<String>,
    pub full_name: Option<String>,
    pub registration_date: Option<String>,
    pub company_status: Option<String>,
    pub company_size: Option<String>,
    pub employees_count: Option<String>,
    pub address: Option<String>,
    pub ceo_name: Option<String>,
    pub main_activity: Option<String>,
    pub additional_activities: Vec<String>,
    pub phones: Vec<String>,
    pub website: Option<String>,
    /// Period the financial figures belong to
    pub finance_year: Option<String>,
    pub revenue: Option<f64>,
    pub profit: Option<f64>,
    pub risk_level: Option<String>,
    /// Failure risk index
    pub ifr: Option<f64>,
    /// Due diligence index
    pub ido: Option<f64>,
    /// Payment discipline index
    pub ipd: Option<f64>,
    pub active_proceedings: Option<String>,
    pub sro_membership: Vec<SroMembership>,
    pub sro_name: Option<String>,
    pub licenses: Vec<License>,
}

impl From<ExtendedReport> for CompanyProfile {
    fn from(raw: ExtendedReport) -> Self {
        let activities = many(raw.activities.and_then(|list| list.okved));
        let main_activity = activities
            .iter()
            .find(|okved| okved.is_main())
            .and_then(|okved| okved.name.clone());
        let additional_activities = activities
            .into_iter()
            .filter(|okved| !okved.is_main())
            .filter_map(|okved| okved.name)
            .collect();

        // Figures come from the latest reported period
        let latest_period = many(raw.finance.and_then(|finance| finance.periods)).pop();
        let finance_year = latest_period
            .as_ref()
            .and_then(|period| period.name.as_ref())
            .and_then(text_of);
        let mut revenue = None;
        let mut profit = None;
        let lines = many(latest_period.and_then(|period| period.lines).and_then(|list| list.line));
        for line in lines {
            if line.form.as_deref() != Some(INCOME_STATEMENT_FORM) {
                continue;
            }
            let value = line.value.as_ref().and_then(number_of);
            match line.code.as_ref().and_then(text_of).as_deref() {
                Some(REVENUE_CODE) => revenue = value,
                Some(NET_PROFIT_CODE) => profit = value,
                _ => {}
            }
        }

        CompanyProfile {
            inn: raw.inn.as_ref().and_then(text_of),
            ogrn: raw.ogrn.as_ref().and_then(text_of),
            legal_name: raw.short_name,
            full_name: raw.full_name,
            registration_date: raw.registration_date,
            company_status: attribute(raw.status.as_ref(), "@Type").and_then(text_of),
            company_size: raw.company_size.as_ref().and_then(description_of),
            employees_count: many(raw.staff.and_then(|staff| staff.number))
                .first()
                .and_then(text_of),
            address: raw.address.as_ref().and_then(text_of),
            ceo_name: many(raw.leaders.and_then(|list| list.leader))
                .into_iter()
                .find_map(|leader| leader.name),
            main_activity,
            additional_activities,
            phones: many(raw.phones.and_then(|list| list.phone))
                .iter()
                .filter_map(text_of)
                .collect(),
            website: raw.website.as_ref().and_then(text_of),
            finance_year,
            revenue,
            profit,
            risk_level: attribute(raw.consolidated_indicator.as_ref(), "@Description").and_then(text_of),
            ifr: attribute(raw.failure_score.as_ref(), "@FailureScoreValue").and_then(number_of),
            ido: attribute(raw.due_diligence.as_ref(), "@Index").and_then(number_of),
            ipd: raw.payment_index.as_ref().and_then(number_of),
            active_proceedings: attribute(raw.execution_proceedings.as_ref(), "@Active").and_then(text_of),
            sro_membership: many(raw.sro_membership.and_then(|list| list.sro))
                .into_iter()
                .map(SroMembership::from)
                .collect(),
            sro_name: None,
            licenses: Vec::new(),
        }
    }
}

/// A configured criterion a profile does not meet
#[derive(Debug, Clone, PartialEq)]
pub struct CriteriaMismatch {
    pub criterion: &'static str,
    pub expected: String,
    pub actual: Option<String>,
}

impl std::fmt::Display for CriteriaMismatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.actual {
            Some(actual) => write!(f, "{}: expected {}, found {}", self.criterion, self.expected, actual),
            None => write!(f, "{}: expected {}, no data", self.criterion, self.expected),
        }
    }
}

impl CompanyProfile {
    /// Fill gaps from the license list and take its licenses
    fn merge_licenses(&mut self, report: LicensesReport) {
        self.inn = self.inn.take().or(report.inn);
        self.ogrn = self.ogrn.take().or(report.ogrn);
        self.legal_name = self.legal_name.take().or(report.short_name);
        self.company_status = self.company_status.take().or(report.liquidation_status);
        self.main_activity = self.main_activity.take().or(report.activity_kind);
        self.licenses = many(report.licenses.and_then(|container| container.license))
            .into_iter()
            .map(License::from)
            .collect();
    }

    /// Every configured criterion this profile fails. A criterion without
    /// registry data counts as failed.
    pub fn check_criteria(&self, criteria: &CriteriaConfig) -> Vec<CriteriaMismatch> {
        let mut mismatches = Vec::new();

        let texts = [
            ("company_status", &criteria.company_status, &self.company_status),
            ("company_size", &criteria.company_size, &self.company_size),
            ("risk_level", &criteria.risk_level, &self.risk_level),
        ];
        for (criterion, expected, actual) in texts {
            let Some(expected) = expected else { continue };
            let matches = actual
                .as_deref()
                .is_some_and(|actual| actual.trim().to_lowercase() == expected.trim().to_lowercase());
            if !matches {
                mismatches.push(CriteriaMismatch {
                    criterion,
                    expected: expected.clone(),
                    actual: actual.clone(),
                });
            }
        }

        let ranges = [
            ("ifr_range", criteria.ifr_range, self.ifr),
            ("ido_range", criteria.ido_range, self.ido),
            ("ipd_range", criteria.ipd_range, self.ipd),
        ];
        for (criterion, range, actual) in ranges {
            let Some([min, max]) = range else { continue };
            if !actual.is_some_and(|value| value >= min && value <= max) {
                mismatches.push(CriteriaMismatch {
                    criterion,
                    expected: format!("{}..={}", min, max),
                    actual: actual.map(|value| value.to_string()),
                });
            }
        }

        if let Some(min) = criteria.min_revenue {
            if !self.revenue.is_some_and(|revenue| revenue >= min) {
                mismatches.push(CriteriaMismatch {
                    criterion: "min_revenue",
                    expected: format!(">= {}", min),
                    actual: self.revenue.map(|revenue| revenue.to_string()),
                });
            }
        }

        if let Some(expected) = &criteria.sro_name {
            let wanted = expected.trim().to_lowercase();
            let member = self
                .sro_name
                .iter()
                .chain(self.sro_membership.iter().filter_map(|sro| sro.name.as_ref()))
                .any(|name| name.trim().to_lowercase() == wanted);
            if !member {
                mismatches.push(CriteriaMismatch {
                    criterion: "sro_name",
                    expected: expected.clone(),
                    actual: self.sro_name.clone(),
                });
            }
        }

        if let Some(expected) = &criteria.licensed_activity {
            let wanted = expected.trim().to_lowercase();
            let licensed = self.licenses.iter().any(|license| {
                license
                    .activity
                    .as_deref()
                    .is_some_and(|activity| activity.to_lowercase().contains(&wanted))
            });
            if !licensed {
                mismatches.push(CriteriaMismatch {
                    criterion: "licensed_activity",
                    expected: expected.clone(),
                    actual: None,
                });
            }
        }

        mismatches
    }

    pub fn meets(&self, criteria: &CriteriaConfig) -> bool {
        self.check_criteria(criteria).is_empty()
    }
}

/// Registry profile per found company, `None` where the lookup failed
pub type Profiles = IndexMap<CandidateId, Option<CompanyProfile>>;

/// Fill empty contact fields of found companies from their profiles. Returns
/// how many companies gained a field.
pub fn enrich_company_data(companies: &mut Companies, profiles: &Profiles) -> usize {
    let mut enriched = 0;
    for company in companies.values_mut() {
        let Some(Some(profile)) = profiles.get(&company.id) else {
            continue;
        };
        if company.phone.is_none() {
            if let Some(phone) = profile.phones.first() {
                debug!("Filling phone of {} from the registry", company.id);
                company.phone = Some(phone.clone());
                enriched += 1;
            }
        }
    }
    enriched
}

/// Keep the companies whose profile meets every criterion, in their original
/// order. Companies without a profile are dropped.
pub fn validate_companies(companies: Companies, profiles: &Profiles, criteria: &CriteriaConfig) -> Companies {
    companies
        .into_iter()
        .filter(|(id, company)| match profiles.get(id) {
            Some(Some(profile)) => {
                let mismatches = profile.check_criteria(criteria);
                for mismatch in &mismatches {
                    info!("{} ({}) rejected: {}", id, company.legal_name, mismatch);
                }
                mismatches.is_empty()
            }
            _ => {
                info!("{} ({}) rejected: no registry profile", id, company.legal_name);
                false
            }
        })
        .collect()
}

pub struct RegistryClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl RegistryClient {
    pub fn new(config: &RegistryConfig) -> Result<Self, RegistryError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    /// Look up a company. Invalid INNs are refused without a request.
    pub async fn lookup(&self, inn: &str) -> Option<CompanyProfile> {
        match self.fetch_profile(inn).await {
            Ok(profile) => Some(profile),
            Err(RegistryError::InvalidInn(inn)) => {
                debug!("Skipping registry lookup for invalid INN {}", inn);
                None
            }
            Err(e) => {
                warn!("Registry lookup for {} failed: {}", inn, e);
                None
            }
        }
    }

    /// Same as [`lookup`](Self::lookup) but keeps the failure reason
    pub async fn fetch_profile(&self, inn: &str) -> Result<CompanyProfile, RegistryError> {
        if !validate_inn(inn) {
            return Err(RegistryError::InvalidInn(inn.to_string()));
        }

        let extended: ExtendedReport = self.report(EXTENDED_REPORT, inn, false).await?;
        let mut profile = CompanyProfile::from(extended);

        let (risks, licenses) = tokio::join!(
            self.report::<RisksReport>(RISKS_REPORT, inn, true),
            self.report::<LicensesReport>(LICENSES_REPORT, inn, true),
        );
        match risks {
            Ok(risks) => profile.sro_name = risks.sro_name(),
            Err(e) => warn!("Risks report for {} unavailable: {}", inn, e),
        }
        match licenses {
            Ok(licenses) => profile.merge_licenses(licenses),
            Err(e) => warn!("License list for {} unavailable: {}", inn, e),
        }

        Ok(profile)
    }

    /// Look up every found company, a few at a time
    pub async fn lookup_all(&self, companies: &Companies) -> Profiles {
        info!("Looking up {} companies in the registry", companies.len());
        stream::iter(companies.values())
            .map(|company| async move { (company.id, self.lookup(&company.inn).await) })
            .buffered(LOOKUP_CONCURRENCY)
            .collect::<Vec<_>>()
            .await
            .into_iter()
            .collect()
    }

    async fn report<T: DeserializeOwned>(
        &self,
        report: &str,
        inn: &str,
        latest: bool,
    ) -> Result<T, RegistryError> {
        let url = format!("{}/{}", self.base_url, report);
        debug!("Registry request: {} inn={}", url, inn);

        let mut request = self
            .client
            .get(&url)
            .query(&[("inn", inn)])
            .header("Accept", "application/json");
        if latest {
            request = request.query(&[("date", "latest")]);
        }
        if !self.api_key.is_empty() {
            request = request.bearer_auth(&self.api_key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(RegistryError::Status(status));
        }

        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }
}
