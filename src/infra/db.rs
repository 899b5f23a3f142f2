use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use tracing::info;

use crate::config::AppConfig;

pub type Db = sqlx::PgPool;

pub const USERS_EMAIL_KEY: &str = "users_email_key";
pub const APPOINTMENTS_SLOT_KEY: &str = "appointments_doctor_slot_key";

pub(crate) const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS users (
        id BIGSERIAL PRIMARY KEY,
        email TEXT NOT NULL,
        password_hash TEXT NOT NULL,
        name TEXT NOT NULL,
        role TEXT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        CONSTRAINT users_email_key UNIQUE (email)
    )",
    "CREATE TABLE IF NOT EXISTS patients (
        id BIGSERIAL PRIMARY KEY,
        user_id BIGINT NOT NULL UNIQUE REFERENCES users(id),
        name TEXT NOT NULL,
        phone TEXT NOT NULL,
        address TEXT,
        emergency_contact TEXT,
        age INTEGER,
        medical_history TEXT
    )",
    "CREATE TABLE IF NOT EXISTS doctors (
        id BIGSERIAL PRIMARY KEY,
        user_id BIGINT NOT NULL UNIQUE REFERENCES users(id),
        name TEXT NOT NULL,
        specialization TEXT NOT NULL,
        phone TEXT NOT NULL,
        department TEXT,
        avatar TEXT,
        experience TEXT,
        rating DOUBLE PRECISION,
        bio TEXT
    )",
    "CREATE TABLE IF NOT EXISTS appointments (
        id BIGSERIAL PRIMARY KEY,
        patient_id BIGINT NOT NULL REFERENCES patients(id),
        doctor_id BIGINT NOT NULL REFERENCES doctors(id),
        date DATE NOT NULL,
        time TIME NOT NULL,
        reason TEXT,
        status TEXT NOT NULL,
        notes TEXT,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )",
    "CREATE INDEX IF NOT EXISTS appointments_patient_idx ON appointments (patient_id)",
    "CREATE INDEX IF NOT EXISTS appointments_doctor_idx ON appointments (doctor_id)",
    // one live booking per doctor and slot
    "CREATE UNIQUE INDEX IF NOT EXISTS appointments_doctor_slot_key
        ON appointments (doctor_id, date, time) WHERE status <> 'CANCELLED'",
];

pub async fn connect(config: &AppConfig) -> anyhow::Result<Db> {
    let url = config
        .database_url
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("DATABASE_URL missing"))?;
    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(url)
        .await
        .with_context(|| "failed to connect to database; check DATABASE_URL")?;
    Ok(pool)
}

/// Creates any missing tables and indexes.
pub async fn ensure_schema(db: &Db) -> anyhow::Result<()> {
    for statement in SCHEMA {
        sqlx::query(statement)
            .execute(db)
            .await
            .with_context(|| format!("schema statement failed: {statement}"))?;
    }
    info!("database schema ready");
    Ok(())
}
