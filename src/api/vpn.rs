// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Server directory endpoints.
//!
//! Only active, non-banned servers are listed. Countries and cities appear
//! only while they have at least one such server.

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, Query, State,
    },
    Json,
};

use crate::{
    error::{ApiError, ErrorBody},
    models::{
        CityResponse, CountryResponse, DataResponse, ProtocolParams, ServerListParams,
        ServerResponse, ServersByAddressRequest,
    },
    state::AppState,
    storage::{GeoRepository, ServerProtocol, ServerQuery, ServerRepository, ServerSort},
};

/// `None` for no filter (absent, empty or `ALL`).
pub(crate) fn parse_protocol(raw: Option<&str>) -> Result<Option<ServerProtocol>, ApiError> {
    match raw.map(str::trim) {
        None | Some("") | Some("ALL") => Ok(None),
        Some(value) => value
            .parse()
            .map(Some)
            .map_err(|_| ApiError::invalid_request("invalid protocol")),
    }
}

fn parse_sort(raw: Option<&str>) -> Result<ServerSort, ApiError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(ServerSort::Id),
        Some("CURRENT_LOAD") => Ok(ServerSort::CurrentLoad),
        Some(_) => Err(ApiError::invalid_request("invalid sortBy")),
    }
}

fn parse_count(name: &str, raw: Option<&str>) -> Result<Option<usize>, ApiError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => value
            .parse()
            .map(Some)
            .map_err(|e| ApiError::invalid_request(format!("invalid {name}: {e}"))),
    }
}

/// List countries that have available servers.
#[utoipa::path(
    get,
    path = "/countries",
    tag = "Directory",
    params(ProtocolParams),
    responses(
        (status = 200, description = "Countries ordered by name, wrapped in `data`", body = Vec<CountryResponse>),
        (status = 400, description = "Invalid protocol", body = ErrorBody)
    )
)]
pub async fn list_countries(
    State(state): State<AppState>,
    Query(params): Query<ProtocolParams>,
) -> Result<Json<DataResponse<Vec<CountryResponse>>>, ApiError> {
    let protocol = parse_protocol(params.protocol.as_deref()).map_err(|e| state.reject(e))?;

    let countries = GeoRepository::new(&state.db)
        .countries_with_servers(protocol)
        .map_err(|e| state.reject(e))?;

    Ok(Json(DataResponse::new(
        countries
            .into_iter()
            .map(|(country, count)| CountryResponse::new(country, count))
            .collect(),
    )))
}

/// List cities of a country that have available servers.
#[utoipa::path(
    get,
    path = "/countries/{country_id}/cities",
    tag = "Directory",
    params(
        ("country_id" = u64, Path, description = "Country ID"),
        ProtocolParams
    ),
    responses(
        (status = 200, description = "Cities, busiest first, wrapped in `data`", body = Vec<CityResponse>),
        (status = 400, description = "Invalid country id or protocol", body = ErrorBody),
        (status = 404, description = "Country not found", body = ErrorBody)
    )
)]
pub async fn list_cities(
    State(state): State<AppState>,
    country_id: Result<Path<u64>, PathRejection>,
    Query(params): Query<ProtocolParams>,
) -> Result<Json<DataResponse<Vec<CityResponse>>>, ApiError> {
    let Path(country_id) = country_id.map_err(|e| {
        state.reject(ApiError::invalid_request(format!("invalid country id: {e}")))
    })?;
    let protocol = parse_protocol(params.protocol.as_deref()).map_err(|e| state.reject(e))?;

    let geo = GeoRepository::new(&state.db);
    geo.get_country(country_id).map_err(|e| state.reject(e))?;
    let cities = geo
        .cities_with_servers(country_id, protocol)
        .map_err(|e| state.reject(e))?;

    Ok(Json(DataResponse::new(
        cities
            .into_iter()
            .map(|(city, count)| CityResponse::new(city, count))
            .collect(),
    )))
}

/// List available servers in a city.
#[utoipa::path(
    get,
    path = "/countries/{country_id}/cities/{city_id}/servers",
    tag = "Directory",
    params(
        ("country_id" = u64, Path, description = "Country ID"),
        ("city_id" = u64, Path, description = "City ID"),
        ServerListParams
    ),
    responses(
        (status = 200, description = "Servers, wrapped in `data`", body = Vec<ServerResponse>),
        (status = 400, description = "Invalid parameter", body = ErrorBody)
    )
)]
pub async fn list_servers(
    State(state): State<AppState>,
    ids: Result<Path<(u64, u64)>, PathRejection>,
    Query(params): Query<ServerListParams>,
) -> Result<Json<DataResponse<Vec<ServerResponse>>>, ApiError> {
    let Path((country_id, city_id)) = ids.map_err(|e| {
        state.reject(ApiError::invalid_request(format!("invalid country or city id: {e}")))
    })?;

    let query = build_server_query(country_id, city_id, &params).map_err(|e| state.reject(e))?;
    let servers = ServerRepository::new(&state.db)
        .list_available(&query)
        .map_err(|e| state.reject(e))?;

    Ok(Json(DataResponse::new(
        servers.iter().map(ServerResponse::from).collect(),
    )))
}

fn build_server_query(
    country_id: u64,
    city_id: u64,
    params: &ServerListParams,
) -> Result<ServerQuery, ApiError> {
    Ok(ServerQuery {
        country_id: Some(country_id),
        city_id: Some(city_id),
        protocol: parse_protocol(params.protocol.as_deref())?,
        sort: parse_sort(params.sort_by.as_deref())?,
        offset: parse_count("offset", params.offset.as_deref())?.unwrap_or(0),
        limit: parse_count("limit", params.limit.as_deref())?,
    })
}

/// Look up servers by address, whatever their state.
#[utoipa::path(
    post,
    path = "/servers",
    tag = "Directory",
    request_body = ServersByAddressRequest,
    responses(
        (status = 200, description = "Matching servers, wrapped in `data`", body = Vec<ServerResponse>),
        (status = 400, description = "Invalid request payload", body = ErrorBody)
    )
)]
pub async fn servers_by_address(
    State(state): State<AppState>,
    payload: Result<Json<ServersByAddressRequest>, JsonRejection>,
) -> Result<Json<DataResponse<Vec<ServerResponse>>>, ApiError> {
    let Json(request) = payload.map_err(|e| {
        state.reject(ApiError::invalid_request(format!("invalid request payload: {e}")))
    })?;

    let servers = ServerRepository::new(&state.db)
        .list_by_addresses(&request.addresses)
        .map_err(|e| state.reject(e))?;

    Ok(Json(DataResponse::new(
        servers.iter().map(ServerResponse::from).collect(),
    )))
}
