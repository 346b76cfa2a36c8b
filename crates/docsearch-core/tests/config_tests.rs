use docsearch_core::config::{resolve_with_base, Config};
use figment::Jail;
use std::path::Path;

#[test]
fn settings_defaults_without_files() {
    Jail::expect_with(|_jail| {
        let config = Config::load().map_err(|e| e.to_string())?;
        let settings = config.settings().map_err(|e| e.to_string())?;
        assert_eq!(settings.embedding.dim, 384);
        assert_eq!(settings.vector.index_name, "vector_idx");
        assert!(settings.search.semantic_strict);
        assert_eq!(settings.rag.max_context_docs, 3);
        Ok(())
    });
}

#[test]
fn settings_merge_files_and_env() {
    Jail::expect_with(|jail| {
        jail.create_file(
            "config.toml",
            r#"
            [data]
            table = "notes"

            [generation]
            model = "llama3.2"
            timeout_secs = 600
            "#,
        )?;
        jail.create_file("config.dev.toml", "[search]\nlexical_limit = 20\n")?;
        jail.set_env("APP_GENERATION__MODEL", "mistral");
        let config = Config::load().map_err(|e| e.to_string())?;
        let settings = config.settings().map_err(|e| e.to_string())?;
        assert_eq!(settings.data.table, "notes");
        assert_eq!(settings.generation.model, "mistral");
        assert_eq!(settings.generation.timeout_secs, 600);
        assert_eq!(settings.search.lexical_limit, 20);
        assert_eq!(config.get::<String>("data.table").map_err(|e| e.to_string())?, "notes");
        Ok(())
    });
}

#[test]
fn settings_reject_invalid_values() {
    Jail::expect_with(|jail| {
        jail.create_file("config.toml", "[rag]\nmax_context_docs = 0\n")?;
        let config = Config::load().map_err(|e| e.to_string())?;
        assert!(config.settings().is_err());
        Ok(())
    });
}

#[test]
fn production_refuses_fake_embeddings() {
    Jail::expect_with(|jail| {
        jail.set_env("RUST_ENV", "production");
        jail.set_env("APP_EMBEDDING__FAKE", "true");
        assert!(Config::load().is_err());
        Ok(())
    });
}

#[test]
fn relative_paths_resolve_against_base() {
    let base = Path::new("/srv/docsearch");
    assert_eq!(resolve_with_base(base, "data/lancedb"), base.join("data/lancedb"));
    assert_eq!(resolve_with_base(base, "/var/lib/x"), Path::new("/var/lib/x"));
}
