use actix_cors::Cors;
use actix_web::{web, App, HttpResponse, HttpServer, Result as ActixResult};
use cerebrosphere_core::{
    property::parse_properties, EntityFilter, EntityShape, Error, ErrorKind, NewEntity, NewLink,
};
use cerebrosphere_storage::StorageManager;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{error, info};

/// Query parameters that are never treated as property filters
const CONTROL_PARAMS: [&str; 2] = ["include_private", "shape"];

#[derive(Deserialize)]
struct EntityQuery {
    include_private: Option<String>,
    shape: Option<String>,
}

#[derive(Deserialize)]
struct NeighborQuery {
    include_private: Option<String>,
    link_type: Option<String>,
}

/// `include_private` is on only for a case-insensitive `true`.
fn include_private(raw: Option<&str>) -> bool {
    raw.map_or(false, |v| v.eq_ignore_ascii_case("true"))
}

fn error_response(e: &Error) -> HttpResponse {
    let body = serde_json::json!({ "error": e.to_string() });
    match e.kind() {
        ErrorKind::NotFound => HttpResponse::NotFound().json(body),
        ErrorKind::Validation => HttpResponse::BadRequest().json(body),
        ErrorKind::Conflict | ErrorKind::Internal => {
            error!(error = %e, "request failed");
            HttpResponse::InternalServerError().json(body)
        }
    }
}

pub struct RestApi;

impl RestApi {
    pub async fn start(storage: Arc<StorageManager>, host: &str, port: u16) -> std::io::Result<()> {
        info!("Binding HTTP API to {}:{}", host, port);
        HttpServer::new(move || {
            let cors = Cors::default()
                .allow_any_origin()
                .allow_any_method()
                .allow_any_header()
                .max_age(3600);

            App::new()
                .wrap(cors)
                .app_data(web::Data::new(storage.clone()))
                .configure(Self::configure)
        })
        .bind((host, port))?
        .run()
        .await
    }

    /// Register every route on an app or test service.
    pub fn configure(cfg: &mut web::ServiceConfig) {
        cfg.route("/", web::get().to(index))
            .route("/entities", web::post().to(create_entity))
            .route("/entities", web::get().to(list_entities))
            .route("/entities/{id}", web::get().to(get_entity))
            .route("/entities/{id}", web::patch().to(patch_entity))
            .route("/entities/{id}", web::delete().to(delete_entity))
            .route("/entities/{id}/links", web::get().to(linked_entities))
            .route("/links", web::post().to(create_link))
            .route("/links", web::get().to(list_links));
    }
}

async fn index() -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/plain; charset=utf-8")
        .body("Cerebrosphere API is running.")
}

async fn create_entity(
    storage: web::Data<Arc<StorageManager>>,
    query: web::Query<EntityQuery>,
    body: web::Json<serde_json::Value>,
) -> ActixResult<HttpResponse> {
    let shape = match EntityShape::parse(query.shape.as_deref()) {
        Ok(s) => s,
        Err(e) => return Ok(error_response(&e)),
    };

    let result = NewEntity::from_json(&body).and_then(|input| storage.create_entity(input));
    match result {
        Ok(entity) => Ok(HttpResponse::Created().json(entity.to_shape(shape))),
        Err(e) => Ok(error_response(&e)),
    }
}

async fn list_entities(
    storage: web::Data<Arc<StorageManager>>,
    query: web::Query<Vec<(String, String)>>,
) -> ActixResult<HttpResponse> {
    let params = query.into_inner();
    let param = |name: &str| {
        params
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    };

    let private = include_private(param("include_private"));
    let shape = match EntityShape::parse(param("shape")) {
        Ok(s) => s,
        Err(e) => return Ok(error_response(&e)),
    };

    let filter = EntityFilter::from_pairs(
        params
            .iter()
            .filter(|(k, _)| !CONTROL_PARAMS.contains(&k.as_str()))
            .map(|(k, v)| (k.as_str(), v.as_str())),
    );

    let entities = match &filter {
        Some(f) => storage.filter_entities(private, f),
        None => storage.list_entities(private),
    };

    let body: Vec<serde_json::Value> = entities.iter().map(|e| e.to_shape(shape)).collect();
    Ok(HttpResponse::Ok().json(body))
}

async fn get_entity(
    storage: web::Data<Arc<StorageManager>>,
    path: web::Path<String>,
    query: web::Query<EntityQuery>,
) -> ActixResult<HttpResponse> {
    let id = path.into_inner();
    let result = EntityShape::parse(query.shape.as_deref()).and_then(|shape| {
        storage
            .get_entity(&id, include_private(query.include_private.as_deref()))
            .map(|e| e.to_shape(shape))
    });

    match result {
        Ok(body) => Ok(HttpResponse::Ok().json(body)),
        Err(e) => Ok(error_response(&e)),
    }
}

async fn patch_entity(
    storage: web::Data<Arc<StorageManager>>,
    path: web::Path<String>,
    query: web::Query<EntityQuery>,
    body: web::Json<serde_json::Value>,
) -> ActixResult<HttpResponse> {
    let id = path.into_inner();

    let result = EntityShape::parse(query.shape.as_deref()).and_then(|shape| {
        let updates = body
            .as_object()
            .ok_or_else(|| Error::validation("request body must be a JSON object"))
            .and_then(parse_properties)?;
        storage
            .patch_entity(&id, updates)
            .map(|e| e.to_shape(shape))
    });

    match result {
        Ok(body) => Ok(HttpResponse::Ok().json(body)),
        Err(e) => Ok(error_response(&e)),
    }
}

async fn delete_entity(
    storage: web::Data<Arc<StorageManager>>,
    path: web::Path<String>,
) -> ActixResult<HttpResponse> {
    let id = path.into_inner();

    match storage.delete_entity(&id) {
        Ok(_) => Ok(HttpResponse::Ok().json(serde_json::json!({
            "result": "Entity and related links deleted"
        }))),
        Err(e) => Ok(error_response(&e)),
    }
}

async fn linked_entities(
    storage: web::Data<Arc<StorageManager>>,
    path: web::Path<String>,
    query: web::Query<NeighborQuery>,
) -> ActixResult<HttpResponse> {
    let id = path.into_inner();
    let neighbors = storage.neighbors_of(
        &id,
        include_private(query.include_private.as_deref()),
        query.link_type.as_deref(),
    );

    let body: Vec<serde_json::Value> = neighbors.iter().map(|e| e.to_summary()).collect();
    Ok(HttpResponse::Ok().json(body))
}

async fn create_link(
    storage: web::Data<Arc<StorageManager>>,
    body: web::Json<serde_json::Value>,
) -> ActixResult<HttpResponse> {
    let result = NewLink::from_json(&body).and_then(|input| storage.create_link(input));
    match result {
        Ok(link) => Ok(HttpResponse::Created().json(link)),
        Err(e) => Ok(error_response(&e)),
    }
}

async fn list_links(storage: web::Data<Arc<StorageManager>>) -> ActixResult<HttpResponse> {
    Ok(HttpResponse::Ok().json(storage.list_links()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::StatusCode;
    use actix_web::test;
    use cerebrosphere_storage::StorageOptions;
    use serde_json::{json, Value};

    fn storage(dir: &tempfile::TempDir) -> Arc<StorageManager> {
        let options = StorageOptions {
            save_interval: None,
            sync_wal: false,
        };
        Arc::new(StorageManager::with_options(dir.path(), options).unwrap())
    }

    macro_rules! app {
        ($storage:expr) => {
            test::init_service(
                App::new()
                    .app_data(web::Data::new($storage.clone()))
                    .configure(RestApi::configure),
            )
            .await
        };
    }

    #[actix_web::test]
    async fn test_error_status_mapping() {
        let status = |e: Error| error_response(&e).status();
        assert_eq!(status(Error::validation("bad")), StatusCode::BAD_REQUEST);
        assert_eq!(status(Error::entity_not_found()), StatusCode::NOT_FOUND);
        assert_eq!(
            status(Error::Conflict("entity e1 already exists".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status(Error::Storage("disk full".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[actix_web::test]
    async fn test_entity_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage(&dir);
        let app = app!(storage);

        let req = test::TestRequest::post()
            .uri("/entities")
            .set_json(json!({"type": "Person", "properties": {"name": "Ada"}}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let created: Value = test::read_body_json(resp).await;
        let id = created["id"].as_str().unwrap().to_string();

        let req = test::TestRequest::get().uri(&format!("/entities/{}", id)).to_request();
        let fetched: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(
            fetched,
            json!({"id": id, "type": "Person", "_private": false, "name": "Ada"})
        );

        let req = test::TestRequest::get()
            .uri(&format!("/entities/{}?shape=nested", id))
            .to_request();
        let nested: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(nested["properties"], json!({"name": "Ada"}));

        let req = test::TestRequest::delete().uri(&format!("/entities/{}", id)).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let req = test::TestRequest::get().uri(&format!("/entities/{}", id)).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let req = test::TestRequest::delete().uri(&format!("/entities/{}", id)).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn test_missing_type_is_bad_request() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage(&dir);
        let app = app!(storage);

        let req = test::TestRequest::post()
            .uri("/entities")
            .set_json(json!({"properties": {"name": "Ada"}}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert!(storage.list_entities(true).is_empty());
    }

    #[actix_web::test]
    async fn test_private_entity_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage(&dir);
        let app = app!(storage);

        let req = test::TestRequest::post()
            .uri("/entities")
            .set_json(json!({"type": "Diary", "_private": true}))
            .to_request();
        let created: Value = test::call_and_read_body_json(&app, req).await;
        let id = created["id"].as_str().unwrap().to_string();

        let req = test::TestRequest::get().uri(&format!("/entities/{}", id)).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body, json!({"error": "Entity not found"}));

        let req = test::TestRequest::get()
            .uri(&format!("/entities/{}?include_private=TRUE", id))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let req = test::TestRequest::get().uri("/entities").to_request();
        let listed: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(listed, json!([]));

        let req = test::TestRequest::get()
            .uri("/entities?include_private=true")
            .to_request();
        let listed: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(listed.as_array().unwrap().len(), 1);
    }

    #[actix_web::test]
    async fn test_patch_upserts_properties() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage(&dir);
        let app = app!(storage);

        let entity = storage
            .create_entity(NewEntity::new("Person").with_property("name", "Ada"))
            .unwrap();

        let req = test::TestRequest::patch()
            .uri(&format!("/entities/{}", entity.id))
            .set_json(json!({"name": "Ada Lovelace", "born": 1815}))
            .to_request();
        let patched: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(patched["name"], json!("Ada Lovelace"));
        assert_eq!(patched["born"], json!("1815"));

        let req = test::TestRequest::patch()
            .uri("/entities/missing")
            .set_json(json!({"name": "x"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let req = test::TestRequest::patch()
            .uri(&format!("/entities/{}", entity.id))
            .set_json(json!({"type": "Robot"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_links_and_neighbors() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage(&dir);
        let app = app!(storage);

        let a = storage.create_entity(NewEntity::new("Person")).unwrap();
        let b = storage.create_entity(NewEntity::new("City")).unwrap();

        let req = test::TestRequest::post()
            .uri("/links")
            .set_json(json!({"entity_a": a.id, "entity_b": b.id}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let link: Value = test::read_body_json(resp).await;
        assert_eq!(link["link_type"], json!("connected_to"));
        assert_eq!(link["entity_a"], json!(a.id));

        let req = test::TestRequest::get()
            .uri(&format!("/entities/{}/links", a.id))
            .to_request();
        let neighbors: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(neighbors, json!([{"id": b.id, "type": "City"}]));

        let req = test::TestRequest::get()
            .uri(&format!("/entities/{}/links", b.id))
            .to_request();
        let neighbors: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(neighbors, json!([{"id": a.id, "type": "Person"}]));

        let req = test::TestRequest::get().uri("/entities/nobody/links").to_request();
        let neighbors: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(neighbors, json!([]));

        let req = test::TestRequest::get().uri("/links").to_request();
        let links: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(links.as_array().unwrap().len(), 1);

        let req = test::TestRequest::post()
            .uri("/links")
            .set_json(json!({"entity_a": a.id}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_list_filters_by_type_and_property() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage(&dir);
        let app = app!(storage);

        storage
            .create_entity(NewEntity::new("Person").with_property("city", "London"))
            .unwrap();
        storage
            .create_entity(NewEntity::new("Person").with_property("city", "Turin"))
            .unwrap();
        storage
            .create_entity(NewEntity::new("Place").with_property("city", "London"))
            .unwrap();

        let req = test::TestRequest::get()
            .uri("/entities?type=Person&city=London")
            .to_request();
        let found: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(found.as_array().unwrap().len(), 1);

        let req = test::TestRequest::get().uri("/entities?city=London").to_request();
        let found: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(found.as_array().unwrap().len(), 2);
    }

    #[actix_web::test]
    async fn test_index() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage(&dir);
        let app = app!(storage);

        let req = test::TestRequest::get().uri("/").to_request();
        let body = test::call_and_read_body(&app, req).await;
        assert_eq!(body, "Cerebrosphere API is running.");
    }
}
