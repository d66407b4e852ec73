use tenancy::db::queries;
use tenancy::error::ErrorKind;
use tenancy::models::*;
use tenancy::rbac::Caller;
use tenancy::service::{api_keys, organizations, projects};

use crate::common::*;

fn key_input(name: &str) -> CreateApiKey {
    CreateApiKey {
        name: name.into(),
        ..Default::default()
    }
}

fn service_account(name: &str, role: OrganizationRole) -> CreateApiKey {
    CreateApiKey {
        name: name.into(),
        is_service_account: true,
        role: Some(role),
        ..Default::default()
    }
}

#[test]
fn test_create_key_returns_secret_once() {
    let env = setup();
    let (org, project) = acme(&env);

    let created =
        api_keys::create_api_key(&env.state, &caller("alice"), &org.id, &project.id, &key_input("laptop"))
            .unwrap();
    assert!(created.id.starts_with("key_"));
    assert!(created.secret.starts_with("sk-"));
    assert_eq!(created.secret.len(), 51);
    assert_eq!(created.user_id, "alice");
    assert_eq!(created.organization.title, "Acme");
    assert_eq!(created.project.title, "Core");
    assert_eq!(created.organization_role, Some(OrganizationRole::Owner));
    assert_eq!(created.project_role, Some(ProjectRole::Owner));
    assert!(created.internal_user_id.is_none());

    let listed = api_keys::list_api_keys(&env.state, &caller("alice")).unwrap();
    assert_eq!(listed.len(), 1);
    assert_ne!(listed[0].secret, created.secret);
    assert_eq!(listed[0].secret.len(), 12);
    assert!(listed[0].secret.starts_with(&created.secret[..5]));
    assert!(listed[0].secret.ends_with(&created.secret[49..]));
    assert!(listed[0].secret.contains("*****"));
}

#[test]
fn test_plaintext_storage_without_data_key() {
    let env = setup();
    let (org, project) = acme(&env);
    let created =
        api_keys::create_api_key(&env.state, &caller("alice"), &org.id, &project.id, &key_input("laptop"))
            .unwrap();

    let stored = queries::get_api_key(&env.conn(), &created.id).unwrap().unwrap();
    assert_eq!(stored.secret.as_deref(), Some(created.secret.as_str()));
    assert!(stored.encrypted_secret.is_none());
}

#[test]
fn test_encrypted_storage_with_data_key() {
    let env = setup_encrypted();
    let (org, project) = acme(&env);
    let created =
        api_keys::create_api_key(&env.state, &caller("alice"), &org.id, &project.id, &key_input("laptop"))
            .unwrap();

    let stored = queries::get_api_key(&env.conn(), &created.id).unwrap().unwrap();
    assert!(stored.secret.is_none());
    let ciphertext = stored.encrypted_secret.unwrap();
    assert!(!ciphertext.windows(created.secret.len()).any(|w| w == created.secret.as_bytes()));

    let data_key = env.state.data_key.as_ref().unwrap();
    assert_eq!(data_key.decrypt_secret(&ciphertext, &created.id).unwrap(), created.secret);
    // Bound to the key id.
    assert!(data_key.decrypt_secret(&ciphertext, "key_other").is_err());

    let listed = api_keys::list_api_keys(&env.state, &caller("alice")).unwrap();
    assert!(listed[0].secret.starts_with(&created.secret[..5]));
}

#[test]
fn test_create_key_validation_and_access() {
    let env = setup();
    let (org, project) = acme(&env);
    add_org_user(&env, "alice", &org.id, "rita", OrganizationRole::Reader);

    let err = api_keys::create_api_key(&env.state, &caller("alice"), &org.id, &project.id, &key_input(" "))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    // An organization reader without a project binding cannot see the project.
    let err = api_keys::create_api_key(&env.state, &caller("rita"), &org.id, &project.id, &key_input("k"))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotVisible);

    let err =
        api_keys::create_api_key(&env.state, &caller("mallory"), &org.id, &project.id, &key_input("k"))
            .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotVisible);

    api_keys::create_api_key(&env.state, &caller("alice"), &org.id, &project.id, &key_input("k")).unwrap();
    let err = api_keys::create_api_key(&env.state, &caller("alice"), &org.id, &project.id, &key_input("k"))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
}

#[test]
fn test_service_account_key() {
    let env = setup();
    let (org, project) = acme(&env);

    let created = api_keys::create_api_key(
        &env.state,
        &caller("alice"),
        &org.id,
        &project.id,
        &service_account("ci", OrganizationRole::Reader),
    )
    .unwrap();
    assert_eq!(created.user_id, "system:serviceaccount:ci");
    assert!(created.is_service_account);
    assert_eq!(created.organization_role, Some(OrganizationRole::Reader));
    assert_eq!(created.project_role, Some(ProjectRole::Owner));

    let conn = env.conn();
    assert!(queries::get_user(&conn, "system:serviceaccount:ci").unwrap().is_some());
    let binding = queries::get_organization_user(&conn, &org.id, "system:serviceaccount:ci")
        .unwrap()
        .unwrap();
    assert!(binding.hidden);
    let binding = queries::get_project_user(&conn, &project.id, "system:serviceaccount:ci")
        .unwrap()
        .unwrap();
    assert!(binding.hidden);
    drop(conn);

    // Hidden bindings stay out of listings.
    let users = organizations::list_organization_users(&env.state, &caller("alice"), &org.id).unwrap();
    assert_eq!(users.len(), 1);
    let users = projects::list_project_users(&env.state, &caller("alice"), &org.id, &project.id).unwrap();
    assert_eq!(users.len(), 1);
}

#[test]
fn test_service_account_requires_role_and_org_owner() {
    let env = setup();
    let (org, project) = acme(&env);
    add_org_user(&env, "alice", &org.id, "bob", OrganizationRole::Reader);
    add_project_user(&env, "alice", &org.id, &project.id, "bob", ProjectRole::Owner);

    let input = CreateApiKey {
        name: "ci".into(),
        is_service_account: true,
        ..Default::default()
    };
    let err = api_keys::create_api_key(&env.state, &caller("alice"), &org.id, &project.id, &input)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let err = api_keys::create_api_key(
        &env.state,
        &caller("bob"),
        &org.id,
        &project.id,
        &service_account("ci", OrganizationRole::Reader),
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PermissionDenied);
}

#[test]
fn test_service_account_creation_is_atomic() {
    let env = setup();
    let (org, project) = acme(&env);
    let other_org = create_org(&env, "alice", "Umbrella");
    let other_project = create_project(&env, "alice", &other_org.id, "Edge", "edge");

    api_keys::create_api_key(
        &env.state,
        &caller("alice"),
        &org.id,
        &project.id,
        &service_account("ci", OrganizationRole::Reader),
    )
    .unwrap();

    // The bindings in the second organization are new, but the key name
    // collides for the shared service-account identity.
    let err = api_keys::create_api_key(
        &env.state,
        &caller("alice"),
        &other_org.id,
        &other_project.id,
        &service_account("ci", OrganizationRole::Reader),
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    let conn = env.conn();
    assert!(
        queries::get_organization_user(&conn, &other_org.id, "system:serviceaccount:ci")
            .unwrap()
            .is_none()
    );
    assert!(
        queries::get_project_user(&conn, &other_project.id, "system:serviceaccount:ci")
            .unwrap()
            .is_none()
    );
    assert_eq!(queries::list_all_api_keys(&conn).unwrap().len(), 1);
}

#[test]
fn test_deleting_service_account_removes_identity() {
    let env = setup();
    let (org, project) = acme(&env);
    let created = api_keys::create_api_key(
        &env.state,
        &caller("alice"),
        &org.id,
        &project.id,
        &service_account("ci", OrganizationRole::Reader),
    )
    .unwrap();

    api_keys::delete_api_key(&env.state, &caller("alice"), &created.id).unwrap();

    let conn = env.conn();
    assert!(queries::get_api_key(&conn, &created.id).unwrap().is_none());
    assert!(queries::get_user(&conn, "system:serviceaccount:ci").unwrap().is_none());
    assert!(
        queries::get_organization_user(&conn, &org.id, "system:serviceaccount:ci")
            .unwrap()
            .is_none()
    );
    assert!(
        queries::get_project_user(&conn, &project.id, "system:serviceaccount:ci")
            .unwrap()
            .is_none()
    );
}

#[test]
fn test_deleting_owner_service_account_clears_later_projects() {
    let env = setup();
    let (org, project) = acme(&env);
    let created = api_keys::create_api_key(
        &env.state,
        &caller("alice"),
        &org.id,
        &project.id,
        &service_account("bot", OrganizationRole::Owner),
    )
    .unwrap();

    // Owners are copied into new projects, hidden flag included.
    let later = create_project(&env, "alice", &org.id, "Later", "later");
    let copied = queries::get_project_user(&env.conn(), &later.id, "system:serviceaccount:bot")
        .unwrap()
        .unwrap();
    assert_eq!(copied.role, ProjectRole::Owner);
    assert!(copied.hidden);

    api_keys::delete_api_key(&env.state, &caller("alice"), &created.id).unwrap();

    let conn = env.conn();
    assert!(
        queries::list_project_users_by_user(&conn, "system:serviceaccount:bot")
            .unwrap()
            .is_empty()
    );
    assert!(queries::get_user(&conn, "system:serviceaccount:bot").unwrap().is_none());
    drop(conn);

    // A new service account with the same name starts clean.
    let again = api_keys::create_api_key(
        &env.state,
        &caller("alice"),
        &org.id,
        &project.id,
        &service_account("bot", OrganizationRole::Reader),
    )
    .unwrap();
    assert_eq!(again.organization_role, Some(OrganizationRole::Reader));
    assert!(
        queries::get_project_user(&env.conn(), &later.id, "system:serviceaccount:bot")
            .unwrap()
            .is_none()
    );
}

#[test]
fn test_service_account_cannot_take_platform_role() {
    let env = setup();
    let (org, project) = acme(&env);

    let err = api_keys::create_api_key(
        &env.state,
        &caller("alice"),
        &org.id,
        &project.id,
        &service_account("ci", OrganizationRole::TenantSystem),
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let conn = env.conn();
    assert!(queries::get_user(&conn, "system:serviceaccount:ci").unwrap().is_none());
    assert!(queries::list_all_api_keys(&conn).unwrap().is_empty());
}

#[test]
fn test_deleting_service_account_tolerates_missing_parts() {
    let env = setup();
    let (org, project) = acme(&env);
    let created = api_keys::create_api_key(
        &env.state,
        &caller("alice"),
        &org.id,
        &project.id,
        &service_account("ci", OrganizationRole::Reader),
    )
    .unwrap();

    {
        let conn = env.conn();
        assert!(queries::delete_project_user(&conn, &project.id, "system:serviceaccount:ci").unwrap());
        assert!(queries::delete_user(&conn, "system:serviceaccount:ci").unwrap());
    }

    api_keys::delete_project_api_key(&env.state, &caller("alice"), &org.id, &project.id, &created.id)
        .unwrap();

    let conn = env.conn();
    assert!(queries::get_api_key(&conn, &created.id).unwrap().is_none());
    assert!(
        queries::get_organization_user(&conn, &org.id, "system:serviceaccount:ci")
            .unwrap()
            .is_none()
    );
}

#[test]
fn test_key_visibility() {
    let env = setup();
    let (org, project) = acme(&env);
    add_org_user(&env, "alice", &org.id, "bob", OrganizationRole::Reader);
    add_project_user(&env, "alice", &org.id, &project.id, "bob", ProjectRole::Member);
    add_org_user(&env, "alice", &org.id, "carol", OrganizationRole::Reader);
    add_project_user(&env, "alice", &org.id, &project.id, "carol", ProjectRole::Member);

    let alice_key =
        api_keys::create_api_key(&env.state, &caller("alice"), &org.id, &project.id, &key_input("alice"))
            .unwrap();
    let bob_key =
        api_keys::create_api_key(&env.state, &caller("bob"), &org.id, &project.id, &key_input("bob"))
            .unwrap();

    // Project owners see every key in the project, members only their own.
    let listed = api_keys::list_project_api_keys(&env.state, &caller("alice"), &org.id, &project.id)
        .unwrap();
    assert_eq!(listed.len(), 2);
    let listed = api_keys::list_project_api_keys(&env.state, &caller("bob"), &org.id, &project.id)
        .unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, bob_key.id);
    assert_eq!(listed[0].project_role, Some(ProjectRole::Member));

    let err = api_keys::delete_api_key(&env.state, &caller("carol"), &bob_key.id).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotVisible);
    let err = api_keys::delete_api_key(&env.state, &caller("bob"), &alice_key.id).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotVisible);

    // Project owners can delete keys of others.
    api_keys::delete_api_key(&env.state, &caller("alice"), &bob_key.id).unwrap();
    let err = api_keys::delete_api_key(&env.state, &caller("alice"), &bob_key.id).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotVisible);
}

#[test]
fn test_tenant_wide_listing_is_scoped() {
    let env = setup();
    let (org, project) = acme(&env);
    api_keys::create_api_key(&env.state, &caller("alice"), &org.id, &project.id, &key_input("mine"))
        .unwrap();

    let foreign = Caller::new("alice", OTHER_TENANT);
    let foreign_org = organizations::create_organization(
        &env.state,
        &foreign,
        &CreateOrganization {
            title: "Elsewhere".into(),
        },
    )
    .unwrap();
    let foreign_project = projects::create_project(
        &env.state,
        &foreign,
        &foreign_org.id,
        &CreateProject {
            title: "Remote".into(),
            kubernetes_namespace: Some("remote".into()),
            ..Default::default()
        },
    )
    .unwrap();
    let foreign_key = api_keys::create_api_key(
        &env.state,
        &foreign,
        &foreign_org.id,
        &foreign_project.id,
        &key_input("theirs"),
    )
    .unwrap();

    let listed = api_keys::list_api_keys(&env.state, &caller("alice")).unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].name, "mine");

    // Keys of another tenant cannot be addressed by id either.
    let err = api_keys::delete_api_key(&env.state, &caller("alice"), &foreign_key.id).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotVisible);
}

#[test]
fn test_delete_project_key_checks_project() {
    let env = setup();
    let (org, project) = acme(&env);
    let edge = create_project(&env, "alice", &org.id, "Edge", "edge");
    let key = api_keys::create_api_key(&env.state, &caller("alice"), &org.id, &project.id, &key_input("k"))
        .unwrap();

    let err = api_keys::delete_project_api_key(&env.state, &caller("alice"), &org.id, &edge.id, &key.id)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotVisible);
    api_keys::delete_project_api_key(&env.state, &caller("alice"), &org.id, &project.id, &key.id).unwrap();
}

#[test]
fn test_update_key_name() {
    let env = setup();
    let (org, project) = acme(&env);
    let key = api_keys::create_api_key(&env.state, &caller("alice"), &org.id, &project.id, &key_input("old"))
        .unwrap();
    api_keys::create_api_key(&env.state, &caller("alice"), &org.id, &project.id, &key_input("taken"))
        .unwrap();

    let updated = api_keys::update_api_key(
        &env.state,
        &caller("alice"),
        &key.id,
        &UpdateApiKey {
            name: Some("new".into()),
            update_mask: vec!["name".into()],
        },
    )
    .unwrap();
    assert_eq!(updated.name, "new");
    assert_ne!(updated.secret, key.secret);

    let err = api_keys::update_api_key(
        &env.state,
        &caller("alice"),
        &key.id,
        &UpdateApiKey {
            name: Some("taken".into()),
            update_mask: vec!["name".into()],
        },
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    let err = api_keys::update_api_key(
        &env.state,
        &caller("alice"),
        &key.id,
        &UpdateApiKey {
            name: Some("other".into()),
            update_mask: vec!["name".into(), "secret".into()],
        },
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[test]
fn test_keys_survive_project_deletion() {
    let env = setup();
    let (org, project) = acme(&env);
    let key = api_keys::create_api_key(&env.state, &caller("alice"), &org.id, &project.id, &key_input("k"))
        .unwrap();

    projects::delete_project(&env.state, &caller("alice"), &org.id, &project.id).unwrap();

    let listed = api_keys::list_api_keys(&env.state, &caller("alice")).unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, key.id);
    assert_eq!(listed[0].project.title, "");
    assert_eq!(listed[0].organization.title, "Acme");
}

#[test]
fn test_acme_walkthrough() {
    let env = setup_encrypted();
    let (org, project) = acme(&env);
    add_org_user(&env, "alice", &org.id, "bob", OrganizationRole::Reader);
    add_project_user(&env, "alice", &org.id, &project.id, "bob", ProjectRole::Member);

    let ci = api_keys::create_api_key(
        &env.state,
        &caller("alice"),
        &org.id,
        &project.id,
        &service_account("ci", OrganizationRole::Reader),
    )
    .unwrap();
    let bob_key =
        api_keys::create_api_key(&env.state, &caller("bob"), &org.id, &project.id, &key_input("bob-cli"))
            .unwrap();

    let listed = api_keys::list_api_keys(&env.state, &caller("alice")).unwrap();
    let mut names: Vec<&str> = listed.iter().map(|k| k.name.as_str()).collect();
    names.sort();
    assert_eq!(names, vec!["bob-cli", "ci"]);
    assert!(listed.iter().all(|k| k.secret != ci.secret && k.secret != bob_key.secret));

    // Bob cannot remove alice's organization or project.
    let err = projects::delete_project(&env.state, &caller("bob"), &org.id, &project.id).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PermissionDenied);

    api_keys::delete_api_key(&env.state, &caller("alice"), &ci.id).unwrap();
    organizations::delete_organization_user(&env.state, &caller("alice"), &org.id, "bob").unwrap();

    let err = projects::list_projects(&env.state, &caller("bob"), &org.id, false).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotVisible);

    // Bob's own key is still addressable by him.
    let listed = api_keys::list_api_keys(&env.state, &caller("bob")).unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].organization_role, None);
    assert_eq!(listed[0].project_role, None);
}
