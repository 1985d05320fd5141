use super::handlers::{auth, companies, health, user_register};
use utoipa::openapi::{Contact, InfoBuilder, License, OpenApiBuilder, Tag};
use utoipa_axum::{router::OpenApiRouter, routes};

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    let (_router, openapi) = api_router().split_for_parts();
    openapi
}

/// Build the router that also drives the `OpenAPI` document.
///
/// Add new endpoints here via `.routes(routes!(...))` so they are both served
/// and included in the generated `OpenAPI` spec. Handlers sharing a path go in
/// the same `routes!` call.
pub(crate) fn api_router() -> OpenApiRouter {
    let mut router = OpenApiRouter::with_openapi(cargo_openapi())
        .routes(routes!(health::health))
        .routes(routes!(user_register::register))
        .routes(routes!(auth::credentials::login))
        .routes(routes!(auth::session::session))
        .routes(routes!(auth::session::logout))
        .routes(routes!(auth::google::providers))
        .routes(routes!(auth::google::google_start))
        .routes(routes!(auth::google::google_callback))
        .routes(routes!(
            companies::create::create_company,
            companies::read::list_companies
        ))
        .routes(routes!(companies::read::get_company));

    router.get_openapi_mut().tags = Some(vec![
        tag("health", "Service and database health"),
        tag("register", "Credential account registration"),
        tag("auth", "Sign-in, sessions, and identity providers"),
        tag("companies", "Company formation records"),
    ]);

    router
}

fn tag(name: &str, description: &str) -> Tag {
    let mut tag = Tag::new(name);
    tag.description = Some(description.to_string());
    tag
}

fn cargo_openapi() -> utoipa::openapi::OpenApi {
    let mut info = InfoBuilder::new()
        .title(env!("CARGO_PKG_NAME"))
        .version(env!("CARGO_PKG_VERSION"))
        .description(optional_str(env!("CARGO_PKG_DESCRIPTION")))
        .build();

    info.contact = cargo_contact();
    info.license = cargo_license();

    OpenApiBuilder::new().info(info).build()
}

// Cargo authors are `;` separated and may include "Name <email>".
fn cargo_contact() -> Option<Contact> {
    let primary = env!("CARGO_PKG_AUTHORS").split(';').next().map(str::trim)?;
    let (name, email) = parse_author(primary);
    if name.is_none() && email.is_none() {
        return None;
    }

    let mut contact = Contact::new();
    contact.name = name.map(str::to_string);
    contact.email = email.map(str::to_string);
    Some(contact)
}

fn cargo_license() -> Option<License> {
    let identifier = optional_str(env!("CARGO_PKG_LICENSE"))?;
    let mut license = License::new(identifier);
    license.identifier = Some(identifier.to_string());
    Some(license)
}

fn optional_str(value: &str) -> Option<&str> {
    Some(value.trim()).filter(|v| !v.is_empty())
}

fn parse_author(author: &str) -> (Option<&str>, Option<&str>) {
    match author.split_once('<') {
        Some((name, email)) => (
            optional_str(name),
            optional_str(email.trim_end().trim_end_matches('>')),
        ),
        None => (optional_str(author), None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_info_from_cargo() {
        let spec = openapi();
        assert_eq!(spec.info.title, env!("CARGO_PKG_NAME"));
        assert_eq!(spec.info.version, env!("CARGO_PKG_VERSION"));

        let contact = spec.info.contact;
        assert!(contact.is_some());
        if let Some(contact) = contact {
            assert_eq!(contact.name.as_deref(), Some("Team Potemkin"));
            assert_eq!(contact.email.as_deref(), Some("team@potemkin.dev"));
        }

        let license = spec.info.license.map(|l| l.name);
        assert_eq!(license.as_deref(), Some("BSD-3-Clause"));
    }

    #[test]
    fn every_route_is_documented() {
        let spec = openapi();
        for path in [
            "/health",
            "/register",
            "/auth/login",
            "/auth/session",
            "/auth/logout",
            "/auth/providers",
            "/auth/google",
            "/auth/google/callback",
            "/companies",
            "/companies/{id}",
        ] {
            assert!(spec.paths.paths.contains_key(path), "missing {path}");
        }
        let companies = spec.paths.paths.get("/companies");
        assert!(companies.is_some_and(|item| item.get.is_some() && item.post.is_some()));
    }

    #[test]
    fn tags_are_described() {
        let tags = openapi().tags.unwrap_or_default();
        assert_eq!(tags.len(), 4);
        assert!(tags.iter().all(|tag| tag.description.is_some()));
    }

    #[test]
    fn parse_author_variants() {
        assert_eq!(
            parse_author("Team Potemkin <team@potemkin.dev>"),
            (Some("Team Potemkin"), Some("team@potemkin.dev"))
        );
        assert_eq!(parse_author("Solo"), (Some("Solo"), None));
        assert_eq!(parse_author("<a@b.c>"), (None, Some("a@b.c")));
        assert_eq!(parse_author(""), (None, None));
    }
}
