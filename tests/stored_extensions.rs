// tests/stored_extensions.rs

//! Stored extensions end to end: install, create, update, uninstall and the
//! listings, against an on-disk catalog.

mod common;

use common::{count, create_role, install, open, setup_catalog};
use tlext::Error;
use tlext::db::models::Extension;
use tlext::extension::{available, manage};

#[test]
fn test_create_follows_update_chain() {
    let (_temp, config) = setup_catalog(&[]);
    let mut session = open(&config, None);

    install(&mut session, "chain", "1.0", "CREATE TABLE chain_t(a integer);", &[]);
    manage::install_update_path(&mut session, "chain", "1.0", "1.1", "ALTER TABLE chain_t ADD COLUMN b integer;")
        .unwrap();
    manage::install_update_path(&mut session, "chain", "1.1", "1.2", "ALTER TABLE chain_t ADD COLUMN c integer;")
        .unwrap();

    session.execute("CREATE EXTENSION chain VERSION '1.2'").unwrap();
    let ext = Extension::find_by_name(session.conn(), "chain").unwrap().unwrap();
    assert_eq!(ext.version, "1.2");

    session.execute("INSERT INTO chain_t (a, b, c) VALUES (1, 2, 3)").unwrap();
    assert_eq!(count(&mut session, "SELECT count(*) FROM chain_t"), 1);
}

#[test]
fn test_alter_extension_update_is_stored() {
    let (_temp, config) = setup_catalog(&[]);
    let mut session = open(&config, None);

    install(&mut session, "upd", "1.0", "CREATE TABLE upd_t(a integer);", &[]);
    session.execute("CREATE EXTENSION upd").unwrap();
    manage::install_update_path(&mut session, "upd", "1.0", "2.0", "ALTER TABLE upd_t ADD COLUMN b integer;")
        .unwrap();

    session.execute("ALTER EXTENSION upd UPDATE TO '2.0'").unwrap();
    let ext = Extension::find_by_name(session.conn(), "upd").unwrap().unwrap();
    assert_eq!(ext.version, "2.0");

    let err = session.execute("ALTER EXTENSION upd UPDATE TO '3.0'").unwrap_err();
    assert!(matches!(err, Error::NoPath(_)));
    assert_eq!(
        err.to_string(),
        "extension \"upd\" has no update path from version \"2.0\" to version \"3.0\""
    );
}

#[test]
fn test_equal_paths_resolve_deterministically() {
    let (_temp, config) = setup_catalog(&[]);
    let mut session = open(&config, None);

    install(&mut session, "tie", "1.0", "SELECT 1;", &[]);
    for (from, to, script) in [
        ("1.0", "b", "CREATE TABLE via_b_first(x integer);"),
        ("1.0", "a", "CREATE TABLE via_a_first(x integer);"),
        ("b", "2.0", "CREATE TABLE via_b(x integer);"),
        ("a", "2.0", "CREATE TABLE via_a(x integer);"),
    ] {
        manage::install_update_path(&mut session, "tie", from, to, script).unwrap();
    }

    let path_of = |session: &tlext::Session| {
        available::extension_update_paths(session.conn(), "tie")
            .unwrap()
            .into_iter()
            .find(|p| p.source == "1.0" && p.target == "2.0")
            .and_then(|p| p.path)
    };
    let first = path_of(&session);
    assert_eq!(first.as_deref(), Some("1.0--a--2.0"));
    for _ in 0..5 {
        assert_eq!(path_of(&session), first);
    }

    session.execute("CREATE EXTENSION tie VERSION '2.0'").unwrap();
    assert_eq!(count(&mut session, "SELECT count(*) FROM via_a"), 0);
    assert!(session.execute("SELECT * FROM via_b").is_err());
}

#[test]
fn test_duplicate_install_keeps_first_script() {
    let (_temp, config) = setup_catalog(&[]);
    let mut session = open(&config, None);

    install(&mut session, "dup", "1.0", "CREATE TABLE first_t(a integer);", &[]);
    let err = manage::install_extension(&mut session, "dup", "1.0", "dup", "CREATE TABLE second_t(a integer);", &[])
        .unwrap_err();
    assert!(matches!(err, Error::AlreadyInstalled { .. }));
    assert_eq!(err.to_string(), "extension \"dup\" already installed");

    let err = manage::install_update_path(&mut session, "dup", "1.0", "1.1", "SELECT 1;")
        .and_then(|_| manage::install_update_path(&mut session, "dup", "1.0", "1.1", "SELECT 2;"))
        .unwrap_err();
    assert_eq!(err.to_string(), "extension \"dup\" update path \"1.0-1.1\" already installed");

    session.execute("CREATE EXTENSION dup").unwrap();
    assert_eq!(count(&mut session, "SELECT count(*) FROM first_t"), 0);
    assert!(session.execute("SELECT * FROM second_t").is_err());
}

#[test]
fn test_uninstall_leaves_instance() {
    let (_temp, config) = setup_catalog(&[]);
    let mut session = open(&config, None);

    install(&mut session, "gone", "1.0", "CREATE TABLE gone_t(a integer);", &[]);
    session.execute("CREATE EXTENSION gone").unwrap();
    manage::uninstall(&mut session, "gone", None).unwrap();

    assert!(Extension::find_by_name(session.conn(), "gone").unwrap().is_some());
    session.execute("INSERT INTO gone_t VALUES (1)").unwrap();

    session.execute("DROP EXTENSION gone").unwrap();
    let err = session.execute("CREATE EXTENSION gone").unwrap_err();
    assert_eq!(err.to_string(), "extension \"gone\" is not available");

    assert!(!manage::uninstall_if_exists(&mut session, "gone", None).unwrap());
    let err = manage::uninstall(&mut session, "gone", None).unwrap_err();
    assert_eq!(err.to_string(), "extension \"gone\" is not installed");
}

#[test]
fn test_uninstall_single_version() {
    let (_temp, config) = setup_catalog(&[]);
    let mut session = open(&config, None);

    install(&mut session, "multi", "1.0", "SELECT 1;", &[]);
    manage::install_extension_version_sql(&mut session, "multi", "2.0", "SELECT 2;").unwrap();

    let err = manage::uninstall(&mut session, "multi", Some("1.0")).unwrap_err();
    assert_eq!(
        err.to_string(),
        "cannot uninstall the default version \"1.0\" of extension \"multi\""
    );

    manage::uninstall(&mut session, "multi", Some("2.0")).unwrap();
    let versions: Vec<String> = available::available_extension_versions(session.conn())
        .unwrap()
        .into_iter()
        .filter(|v| v.name == "multi")
        .map(|v| v.version)
        .collect();
    assert_eq!(versions, vec!["1.0".to_string()]);

    manage::uninstall(&mut session, "multi", Some("1.0")).unwrap();
    assert!(
        available::available_extensions(session.conn())
            .unwrap()
            .iter()
            .all(|e| e.name != "multi")
    );
}

#[test]
fn test_non_admin_cannot_manage() {
    let (_temp, config) = setup_catalog(&[]);
    let mut boot = open(&config, None);
    create_role(&boot, "alice", true, false);
    install(&mut boot, "owned", "1.0", "SELECT 1;", &[]);
    drop(boot);

    let mut session = open(&config, Some("alice"));
    let errors = [
        manage::install_extension(&mut session, "x", "1.0", "x", "SELECT 1;", &[]).unwrap_err(),
        manage::uninstall(&mut session, "owned", None).unwrap_err(),
        manage::install_update_path(&mut session, "owned", "1.0", "1.1", "SELECT 1;").unwrap_err(),
        manage::set_default_version(&mut session, "owned", "1.0").unwrap_err(),
        session
            .execute("SELECT tle.install_extension('x', '1.0', 'x', 'SELECT 1;')")
            .unwrap_err(),
    ];
    for err in errors {
        assert!(matches!(err, Error::PermissionDenied { .. }), "{err}");
        assert_eq!(err.hint(), Some("Grant the \"tle_admin\" role to use this function."));
    }
}

#[test]
fn test_admin_member_can_manage() {
    let (_temp, config) = setup_catalog(&[]);
    let boot = open(&config, None);
    create_role(&boot, "bob", true, true);
    drop(boot);

    let mut session = open(&config, Some("bob"));
    install(&mut session, "bobs", "1.0", "CREATE TABLE bobs_t(a integer);", &[]);
    session.execute("CREATE EXTENSION bobs").unwrap();
    let ext = Extension::find_by_name(session.conn(), "bobs").unwrap().unwrap();
    assert_eq!(ext.owner_oid, session.session_user().oid);
}

#[test]
fn test_transaction_control_in_script() {
    let (_temp, config) = setup_catalog(&[]);
    let mut session = open(&config, None);

    install(
        &mut session,
        "txn",
        "1.0",
        "CREATE TABLE txn_t(a integer); COMMIT; CREATE TABLE txn_u(a integer);",
        &[],
    );
    let err = session.execute("CREATE EXTENSION txn").unwrap_err();
    assert!(matches!(err, Error::InvalidTransactionState(_)));

    assert!(session.execute("SELECT * FROM txn_t").is_err());
    assert!(Extension::find_by_name(session.conn(), "txn").unwrap().is_none());
}

#[test]
fn test_versions_listing() {
    let (_temp, config) = setup_catalog(&[]);
    let mut session = open(&config, None);

    install(&mut session, "e", "1.0", "SELECT 1;", &[]);
    manage::install_update_path(&mut session, "e", "1.0", "2.0", "SELECT 2;").unwrap();

    let rows: Vec<_> = available::available_extension_versions(session.conn())
        .unwrap()
        .into_iter()
        .filter(|v| v.name == "e")
        .collect();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].version, "1.0");
    assert_eq!(rows[1].version, "2.0");
    for row in &rows {
        assert_eq!(row.requires, vec!["tle".to_string()]);
        assert!(!row.superuser);
        assert!(!row.trusted);
        assert!(!row.relocatable);
    }

    let listed = available::available_extensions(session.conn()).unwrap();
    let e = listed.iter().find(|x| x.name == "e").unwrap();
    assert_eq!(e.default_version.as_deref(), Some("1.0"));
    assert_eq!(e.comment.as_deref(), Some("e"));

    manage::set_default_version(&mut session, "e", "2.0").unwrap();
    session.execute("CREATE EXTENSION e").unwrap();
    let ext = Extension::find_by_name(session.conn(), "e").unwrap().unwrap();
    assert_eq!(ext.version, "2.0");
}

#[test]
fn test_invalid_names_change_nothing() {
    let (_temp, config) = setup_catalog(&[]);
    let mut session = open(&config, None);
    let before = available::available_extensions(session.conn()).unwrap();

    for name in ["bad--name", "-lead", "trail-", "sl/ash", "sp ace", ""] {
        let err = manage::install_extension(&mut session, name, "1.0", "d", "SELECT 1;", &[]).unwrap_err();
        assert!(matches!(err, Error::InvalidName { .. }), "{name}: {err}");
        let err = manage::set_default_version(&mut session, name, "1.0").unwrap_err();
        assert!(matches!(err, Error::InvalidName { .. }), "{name}: {err}");
        let err = manage::uninstall(&mut session, name, None).unwrap_err();
        assert!(matches!(err, Error::InvalidName { .. }), "{name}: {err}");
    }
    for version in ["1--2", "-1", "1-", "a/b"] {
        let err = manage::install_extension(&mut session, "okname", version, "d", "SELECT 1;", &[]).unwrap_err();
        assert!(matches!(err, Error::InvalidName { .. }), "{version}: {err}");
        let err = manage::install_update_path(&mut session, "okname", "1.0", version, "SELECT 1;").unwrap_err();
        assert!(matches!(err, Error::InvalidName { .. }), "{version}: {err}");
    }

    assert_eq!(available::available_extensions(session.conn()).unwrap(), before);
}

#[test]
fn test_cascade_installs_requirements() {
    let (_temp, config) = setup_catalog(&[]);
    let mut session = open(&config, None);

    install(&mut session, "base", "1.0", "CREATE TABLE base_t(a integer);", &[]);
    install(&mut session, "top", "1.0", "CREATE TABLE top_t(a integer);", &["base"]);

    let err = session.execute("CREATE EXTENSION top").unwrap_err();
    assert_eq!(err.to_string(), "required extension \"base\" is not installed");

    session.execute("CREATE EXTENSION top CASCADE").unwrap();
    assert!(Extension::find_by_name(session.conn(), "base").unwrap().is_some());

    let err = session.execute("DROP EXTENSION base").unwrap_err();
    assert_eq!(
        err.to_string(),
        "cannot drop extension base because other objects depend on it"
    );
    assert!(err.hint().unwrap().starts_with("extension top depends on extension base"));
    session.execute("DROP EXTENSION base CASCADE").unwrap();
    assert!(Extension::find_by_name(session.conn(), "top").unwrap().is_none());
    assert!(session.execute("SELECT * FROM top_t").is_err());
}

#[test]
fn test_failed_create_leaves_no_trace() {
    let (_temp, config) = setup_catalog(&[]);
    let mut session = open(&config, None);

    install(
        &mut session,
        "broken",
        "1.0",
        "CREATE TABLE broken_t(a integer); INSERT INTO nowhere VALUES (1);",
        &[],
    );
    assert!(session.execute("CREATE EXTENSION broken").is_err());
    assert!(Extension::find_by_name(session.conn(), "broken").unwrap().is_none());
    assert!(session.execute("SELECT * FROM broken_t").is_err());
}

#[test]
fn test_cascade_cycle_leaves_no_trace() {
    let (_temp, config) = setup_catalog(&[]);
    let mut session = open(&config, None);

    install(&mut session, "ca", "1.0", "CREATE TABLE ca_t(a integer);", &["cb"]);
    install(&mut session, "cb", "1.0", "CREATE TABLE cb_t(a integer);", &["ca"]);

    let err = session.execute("CREATE EXTENSION ca CASCADE").unwrap_err();
    assert!(matches!(err, Error::CyclicDependency { .. }));
    assert_eq!(
        err.to_string(),
        "cyclic dependency detected between extensions \"ca\" and \"cb\""
    );
    assert!(Extension::find_by_name(session.conn(), "ca").unwrap().is_none());
    assert!(Extension::find_by_name(session.conn(), "cb").unwrap().is_none());
    assert!(session.execute("SELECT * FROM cb_t").is_err());
}

#[test]
fn test_script_cannot_nest_extension_commands() {
    let (_temp, config) = setup_catalog(&[]);
    let mut session = open(&config, None);

    install(&mut session, "inner", "1.0", "CREATE TABLE inner_t(a integer);", &[]);
    manage::install_update_path(&mut session, "inner", "1.0", "1.1", "SELECT 1;").unwrap();
    install(&mut session, "outer", "1.0", "CREATE EXTENSION inner;", &[]);
    install(&mut session, "bumper", "1.0", "ALTER EXTENSION inner UPDATE TO '1.1';", &[]);

    let err = session.execute("CREATE EXTENSION outer").unwrap_err();
    assert!(matches!(err, Error::Nested(_)));
    assert_eq!(err.to_string(), "nested CREATE EXTENSION is not supported");
    assert!(Extension::find_by_name(session.conn(), "outer").unwrap().is_none());
    assert!(Extension::find_by_name(session.conn(), "inner").unwrap().is_none());

    session.execute("CREATE EXTENSION inner").unwrap();
    let err = session.execute("CREATE EXTENSION bumper").unwrap_err();
    assert_eq!(err.to_string(), "nested ALTER EXTENSION is not supported");
    let inner = Extension::find_by_name(session.conn(), "inner").unwrap().unwrap();
    assert_eq!(inner.version, "1.0");
    assert!(Extension::find_by_name(session.conn(), "bumper").unwrap().is_none());
}
