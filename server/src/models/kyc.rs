//! KYC profiles, one per participant
//!
//! All variants share one table; `kind` selects which optional columns are
//! meaningful. `KycRecord` is the typed view used by the rest of the crate.

use chrono::{NaiveDate, NaiveDateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{EscrowError, EscrowResult};
use crate::models::escrow::string_enum;
use crate::models::escrow_participant::EscrowRole;
use crate::schema::kyc_profiles;

string_enum! {
    /// Which KYC form applies to a participant
    KycKind {
        Buyer => "BUYER",
        Seller => "SELLER",
        Broker => "BROKER",
    }
}

impl KycKind {
    /// Brokers and co-brokers share the broker form
    pub fn for_role(role: EscrowRole) -> KycKind {
        match role {
            EscrowRole::Buyer => KycKind::Buyer,
            EscrowRole::Seller => KycKind::Seller,
            EscrowRole::Broker | EscrowRole::CoBroker => KycKind::Broker,
        }
    }
}

/// Fields every KYC form has
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KycIdentity {
    pub full_legal_name: String,
    pub national_id_number: String,
    pub dob: NaiveDate,
    pub address: String,
    pub occupation: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundsDetails {
    pub source_of_funds: Option<String>,
    pub tax_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokerLicense {
    pub license_number: String,
    pub license_state: String,
    pub brokerage_firm_name: String,
}

/// Role-specific part of a KYC profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum KycDetails {
    Buyer(FundsDetails),
    Seller(FundsDetails),
    Broker(BrokerLicense),
}

impl KycDetails {
    pub fn kind(&self) -> KycKind {
        match self {
            KycDetails::Buyer(_) => KycKind::Buyer,
            KycDetails::Seller(_) => KycKind::Seller,
            KycDetails::Broker(_) => KycKind::Broker,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KycRecord {
    #[serde(flatten)]
    pub identity: KycIdentity,
    #[serde(flatten)]
    pub details: KycDetails,
}

/// KYC row - field order matches schema.rs
#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = kyc_profiles)]
pub struct KycProfile {
    pub id: String,
    pub participant_id: String,
    pub kind: String,
    pub full_legal_name: String,
    pub national_id_number: String,
    pub dob: NaiveDate,
    pub address: String,
    pub occupation: String,
    pub source_of_funds: Option<String>,
    pub tax_id: Option<String>,
    pub license_number: Option<String>,
    pub license_state: Option<String>,
    pub brokerage_firm_name: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Insertable, AsChangeset)]
#[diesel(table_name = kyc_profiles)]
struct KycProfileChanges {
    kind: String,
    full_legal_name: String,
    national_id_number: String,
    dob: NaiveDate,
    address: String,
    occupation: String,
    #[diesel(treat_none_as_null = true)]
    source_of_funds: Option<String>,
    #[diesel(treat_none_as_null = true)]
    tax_id: Option<String>,
    #[diesel(treat_none_as_null = true)]
    license_number: Option<String>,
    #[diesel(treat_none_as_null = true)]
    license_state: Option<String>,
    #[diesel(treat_none_as_null = true)]
    brokerage_firm_name: Option<String>,
    updated_at: NaiveDateTime,
}

impl KycProfileChanges {
    fn from_record(record: &KycRecord) -> Self {
        let (source_of_funds, tax_id, license_number, license_state, brokerage_firm_name) =
            match &record.details {
                KycDetails::Buyer(f) | KycDetails::Seller(f) => {
                    (f.source_of_funds.clone(), f.tax_id.clone(), None, None, None)
                }
                KycDetails::Broker(b) => (
                    None,
                    None,
                    Some(b.license_number.clone()),
                    Some(b.license_state.clone()),
                    Some(b.brokerage_firm_name.clone()),
                ),
            };

        Self {
            kind: record.details.kind().as_str().to_string(),
            full_legal_name: record.identity.full_legal_name.clone(),
            national_id_number: record.identity.national_id_number.clone(),
            dob: record.identity.dob,
            address: record.identity.address.clone(),
            occupation: record.identity.occupation.clone(),
            source_of_funds,
            tax_id,
            license_number,
            license_state,
            brokerage_firm_name,
            updated_at: Utc::now().naive_utc(),
        }
    }
}

impl KycProfile {
    pub fn find_by_participant(
        conn: &mut SqliteConnection,
        participant_id: &str,
    ) -> EscrowResult<Option<KycProfile>> {
        Ok(kyc_profiles::table
            .filter(kyc_profiles::participant_id.eq(participant_id))
            .first(conn)
            .optional()?)
    }

    /// Full replace of the participant's profile
    pub fn upsert(
        conn: &mut SqliteConnection,
        participant_id: &str,
        record: &KycRecord,
    ) -> EscrowResult<KycProfile> {
        let changes = KycProfileChanges::from_record(record);

        let updated = diesel::update(
            kyc_profiles::table.filter(kyc_profiles::participant_id.eq(participant_id)),
        )
        .set(&changes)
        .execute(conn)?;

        if updated == 0 {
            diesel::insert_into(kyc_profiles::table)
                .values((
                    kyc_profiles::id.eq(Uuid::new_v4().to_string()),
                    kyc_profiles::participant_id.eq(participant_id),
                    kyc_profiles::created_at.eq(changes.updated_at),
                    &changes,
                ))
                .execute(conn)?;
        }

        Self::find_by_participant(conn, participant_id)?
            .ok_or_else(|| EscrowError::Internal("KYC profile missing after upsert".to_string()))
    }

    pub fn kind(&self) -> EscrowResult<KycKind> {
        self.kind
            .parse()
            .map_err(|_| EscrowError::Internal(format!("Stored KYC kind is invalid: {}", self.kind)))
    }

    /// Typed view of the row
    pub fn to_record(&self) -> EscrowResult<KycRecord> {
        let identity = KycIdentity {
            full_legal_name: self.full_legal_name.clone(),
            national_id_number: self.national_id_number.clone(),
            dob: self.dob,
            address: self.address.clone(),
            occupation: self.occupation.clone(),
        };

        let funds = || FundsDetails {
            source_of_funds: self.source_of_funds.clone(),
            tax_id: self.tax_id.clone(),
        };

        let details = match self.kind()? {
            KycKind::Buyer => KycDetails::Buyer(funds()),
            KycKind::Seller => KycDetails::Seller(funds()),
            KycKind::Broker => KycDetails::Broker(BrokerLicense {
                license_number: self.license_number.clone().unwrap_or_default(),
                license_state: self.license_state.clone().unwrap_or_default(),
                brokerage_firm_name: self.brokerage_firm_name.clone().unwrap_or_default(),
            }),
        };

        Ok(KycRecord { identity, details })
    }
}
