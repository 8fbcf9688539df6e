//! Rendering of responses.
//!
//! > View is the only module that knows anything about HTML, or JSON, or other "renderings" of the
//! > response. I'm happy to call this "view" in common with traditional stateless MVC, because
//! > it's role is largely the same.
//!
//! Every JSON response is wrapped in the same envelope, `{"Success": ..., "Data": ...,
//! "Error": ...}`. Documents (certificates) are HTML, rendered from templates compiled into the
//! binary.

use failure::{Error, Fallible};
use serde::Serialize;
use tera::{Context, Tera};
use warp::{
    http::{header::CONTENT_TYPE, Response, StatusCode},
    reply::{json, with_status, Json, WithStatus},
};

lazy_static::lazy_static! {
    static ref TERA: Tera = {
        let mut tera = Tera::default();
        tera.add_raw_templates(vec![
            ("base.html", include_str!("templates/base.html")),
            (
                "certificate-of-schooling.html",
                include_str!("templates/certificate-of-schooling.html"),
            ),
            ("self-testing.html", include_str!("templates/self-testing.html")),
        ])
        .unwrap();
        tera
    };
}

#[derive(serde_derive::Serialize)]
struct Envelope<T> {
    #[serde(rename = "Success")]
    success: bool,
    #[serde(rename = "Data")]
    data: T,
    #[serde(rename = "Error")]
    error: String,
}

/// Wraps data in a successful envelope, with the given status.
pub fn envelope<T: Serialize>(status: StatusCode, data: T) -> WithStatus<Json> {
    let body = Envelope {
        success: true,
        data,
        error: String::new(),
    };
    with_status(json(&body), status)
}

/// A `200 OK` response carrying data.
pub fn success<T: Serialize>(data: T) -> WithStatus<Json> {
    envelope(StatusCode::OK, data)
}

/// A `201 Created` response carrying data (usually the new ID).
pub fn created<T: Serialize>(data: T) -> WithStatus<Json> {
    envelope(StatusCode::CREATED, data)
}

/// An error response.
pub fn failure(status: StatusCode, error: String) -> WithStatus<Json> {
    let body = Envelope {
        success: false,
        data: (),
        error,
    };
    with_status(json(&body), status)
}

/// Renders a template as HTML to a String.
pub fn render<T: Serialize>(name: &str, data: T) -> Fallible<String> {
    let ctx = Context::from_serialize(data)?;
    Ok(TERA.render(name, &ctx)?)
}

/// Renders a template as an HTML response.
pub fn render_html<T: Serialize>(name: &str, data: T) -> Fallible<Response<String>> {
    let body = render(name, data)?;
    Response::builder()
        .header(CONTENT_TYPE, "text/html; charset=utf-8")
        .body(body)
        .map_err(Error::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Class, Role, Testing, TestingResult, User};
    use chrono::NaiveDate;
    use serde_json::{json, Value};
    use warp::Reply;

    fn user(id: i32, name: &str, role: Role) -> User {
        User {
            id,
            email: format!("{}@school.si", id),
            password: "hash".to_string(),
            role,
            name: name.to_string(),
            birth_certificate_number: String::new(),
            birthday: NaiveDate::from_ymd_opt(2008, 3, 14),
            city_of_birth: "Ljubljana".to_string(),
            country_of_birth: "Slovenia".to_string(),
            is_passing: true,
        }
    }

    async fn body_of(reply: WithStatus<Json>) -> (StatusCode, Value) {
        let response = reply.into_response();
        let status = response.status();
        let bytes = warp::hyper::body::to_bytes(response.into_body())
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn envelopes_use_capitalized_keys() {
        let (status, body) = body_of(created(7)).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body, json!({"Success": true, "Data": 7, "Error": ""}));

        let (status, body) = body_of(failure(StatusCode::FORBIDDEN, "Forbidden".to_string())).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(
            body,
            json!({"Success": false, "Data": null, "Error": "Forbidden"})
        );
    }

    #[test]
    fn passwords_never_leave_the_server() {
        let body = serde_json::to_value(user(1, "Ana", Role::Student)).unwrap();
        assert!(body.get("password").is_none());
        assert_eq!(body["role"], "student");
    }

    #[test]
    fn certificate_of_schooling_renders() {
        let html = render(
            "certificate-of-schooling.html",
            json!({
                "school_name": "OŠ Test",
                "student": user(3, "Ana Novak", Role::Student),
                "class": Class {
                    id: 1,
                    name: "7.a".to_string(),
                    teacher: 2,
                    class_year: "2021/2022".to_string(),
                },
                "principal": user(9, "Marija Kos", Role::Principal),
                "issued": "2021-10-04",
            }),
        )
        .unwrap();
        assert!(html.contains("Ana Novak"));
        assert!(html.contains("7.a"));
        assert!(html.contains("Marija Kos"));
        assert!(html.contains("OŠ Test"));
    }

    #[test]
    fn self_testing_certificate_renders() {
        let html = render(
            "self-testing.html",
            json!({
                "school_name": "OŠ Test",
                "student": user(3, "Ana Novak", Role::Student),
                "testing": Testing {
                    id: 5,
                    user_id: 3,
                    teacher_id: 2,
                    class_id: 1,
                    date: NaiveDate::from_ymd_opt(2021, 10, 4).unwrap(),
                    result: TestingResult::Negative,
                },
                "token": "abc.def.ghi",
                "valid_until": "2021-10-06",
            }),
        )
        .unwrap();
        assert!(html.contains("NEGATIVE"));
        assert!(html.contains("abc.def.ghi"));
        assert!(html.contains("2021-10-06"));
    }
}
