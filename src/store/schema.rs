//! PostGIS schema definition

/// SQL schema for the catalog database
pub const SCHEMA_SQL: &str = r#"
CREATE EXTENSION IF NOT EXISTS postgis;

-- Collections: one per indexed root directory
CREATE TABLE IF NOT EXISTS collections (
    id TEXT PRIMARY KEY,
    title TEXT,
    description TEXT,
    license TEXT,
    root_path TEXT,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

-- Items: one per cataloged source file
CREATE TABLE IF NOT EXISTS items (
    id TEXT PRIMARY KEY,
    collection_id TEXT NOT NULL REFERENCES collections(id),
    title TEXT,
    description TEXT,
    datetime TIMESTAMPTZ NOT NULL,
    geom geometry(Polygon, 4326) NOT NULL,
    bbox DOUBLE PRECISION[] NOT NULL,
    properties JSONB NOT NULL DEFAULT '{}'::jsonb,
    assets JSONB NOT NULL DEFAULT '{}'::jsonb,
    stac_extensions JSONB NOT NULL DEFAULT '[]'::jsonb,
    source_path TEXT NOT NULL UNIQUE,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

-- Indexes for lookup and spatial search
CREATE INDEX IF NOT EXISTS idx_items_collection ON items(collection_id);
CREATE INDEX IF NOT EXISTS idx_items_geom ON items USING GIST (geom);
"#;
