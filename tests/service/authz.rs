use tenancy::error::ErrorKind;
use tenancy::models::*;
use tenancy::rbac::{Authorizer, Caller, OrgCreationPolicy};
use tenancy::service::{api_keys, organizations, projects};

use crate::common::*;

#[test]
fn test_non_member_gets_not_found_and_reader_gets_permission_denied() {
    let env = setup();
    let (org, _) = acme(&env);
    add_org_user(&env, "alice", &org.id, "rita", OrganizationRole::Reader);

    let input = CreateOrganizationUser {
        user_id: "newbie".into(),
        role: OrganizationRole::Reader,
    };
    let err = organizations::create_organization_user(&env.state, &caller("mallory"), &org.id, &input)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotVisible);

    let err = organizations::create_organization_user(&env.state, &caller("rita"), &org.id, &input)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PermissionDenied);
}

#[test]
fn test_missing_and_invisible_organizations_look_the_same() {
    let env = setup();
    let (org, _) = acme(&env);

    let missing = organizations::delete_organization(&env.state, &caller("mallory"), "org-missing")
        .unwrap_err();
    let hidden = organizations::delete_organization(&env.state, &caller("mallory"), &org.id)
        .unwrap_err();
    assert_eq!(missing.kind(), ErrorKind::NotVisible);
    assert_eq!(hidden.kind(), ErrorKind::NotVisible);
}

#[test]
fn test_other_tenant_cannot_see_organization() {
    let env = setup();
    let (org, _) = acme(&env);

    let outsider = Caller::new("alice", OTHER_TENANT);
    let err = organizations::list_organization_users(&env.state, &outsider, &org.id).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotVisible);
    assert!(
        organizations::list_organizations(&env.state, &outsider, false)
            .unwrap()
            .is_empty()
    );
}

#[test]
fn test_org_owner_acts_as_project_owner_without_binding() {
    let env = setup();
    let (org, project) = acme(&env);
    // Granted after the project existed, so no project binding is snapshotted.
    add_org_user(&env, "alice", &org.id, "olga", OrganizationRole::Owner);
    assert!(
        tenancy::rbac::project_role(&env.conn(), &project.id, "olga")
            .unwrap()
            .is_none()
    );

    add_org_user(&env, "alice", &org.id, "bob", OrganizationRole::Reader);
    add_project_user(&env, "olga", &org.id, &project.id, "bob", ProjectRole::Member);

    projects::update_project(
        &env.state,
        &caller("olga"),
        &org.id,
        &project.id,
        &UpdateProject {
            title: Some("Core v2".into()),
            update_mask: vec!["title".into()],
        },
    )
    .unwrap();
}

#[test]
fn test_project_member_cannot_perform_owner_actions() {
    let env = setup();
    let (org, project) = acme(&env);
    add_org_user(&env, "alice", &org.id, "bob", OrganizationRole::Reader);
    add_project_user(&env, "alice", &org.id, &project.id, "bob", ProjectRole::Member);

    let err = projects::delete_project(&env.state, &caller("bob"), &org.id, &project.id).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PermissionDenied);

    let err = projects::create_project_user(
        &env.state,
        &caller("bob"),
        &org.id,
        &project.id,
        &CreateProjectUser {
            user_id: "carol".into(),
            role: ProjectRole::Member,
        },
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PermissionDenied);

    // Membership is enough for listing users and creating personal keys.
    assert_eq!(
        projects::list_project_users(&env.state, &caller("bob"), &org.id, &project.id)
            .unwrap()
            .len(),
        2
    );
    api_keys::create_api_key(
        &env.state,
        &caller("bob"),
        &org.id,
        &project.id,
        &CreateApiKey {
            name: "bob-key".into(),
            ..Default::default()
        },
    )
    .unwrap();
}

#[test]
fn test_org_reader_without_project_binding_cannot_see_project() {
    let env = setup();
    let (org, project) = acme(&env);
    add_org_user(&env, "alice", &org.id, "rita", OrganizationRole::Reader);

    let err = projects::list_project_users(&env.state, &caller("rita"), &org.id, &project.id)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotVisible);

    // The organization itself is visible, just without projects.
    let listed = projects::list_projects(&env.state, &caller("rita"), &org.id, false).unwrap();
    assert!(listed.is_empty());
}

#[test]
fn test_disabled_authorization_skips_guards_and_filtering() {
    let env = setup_with(Authorizer::disabled(), None);
    let pseudo = Caller::pseudo();

    let org = organizations::create_organization(
        &env.state,
        &pseudo,
        &CreateOrganization {
            title: "Acme".into(),
        },
    )
    .unwrap();

    // Another organization the pseudo user has no binding in.
    {
        let conn = env.conn();
        tenancy::db::queries::create_organization(&conn, &pseudo.tenant_id, "Foreign", false)
            .unwrap();
    }

    let listed = organizations::list_organizations(&env.state, &pseudo, false).unwrap();
    assert_eq!(listed.len(), 2);

    projects::create_project(
        &env.state,
        &pseudo,
        &org.id,
        &CreateProject {
            title: "Core".into(),
            kubernetes_namespace: Some("core".into()),
            ..Default::default()
        },
    )
    .unwrap();
}

#[test]
fn test_org_creation_policy_requires_default_org_owner() {
    let env = setup_with(
        Authorizer::new(true, OrgCreationPolicy::DefaultOrganizationOwner),
        None,
    );
    let input = CreateOrganization {
        title: "Acme".into(),
    };

    let err = organizations::create_organization(&env.state, &caller("admin"), &input).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PermissionDenied);

    {
        let conn = env.conn();
        let default_org =
            tenancy::db::queries::create_organization(&conn, TENANT, "Default", true).unwrap();
        tenancy::db::queries::create_organization_user(
            &conn,
            &default_org.id,
            "admin",
            OrganizationRole::Owner,
            false,
        )
        .unwrap();
    }

    organizations::create_organization(&env.state, &caller("admin"), &input).unwrap();
    let err = organizations::create_organization(
        &env.state,
        &caller("someone"),
        &CreateOrganization {
            title: "Other".into(),
        },
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PermissionDenied);
}
