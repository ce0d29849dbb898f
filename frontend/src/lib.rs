pub mod seo;
pub mod zip_search;

use seed::{prelude::*, virtual_dom::AtValue, *};
use serde::Deserialize;
use serde_wasm_bindgen::to_value;
use shared::{
    Bounds, Camera, CamerasResponse, Coordinate, DirectionsRequest, DirectionsResponse, ErrorBody,
    ExposureSummary, RouteAnalysis, TravelMode,
};
use wasm_bindgen::{
    prelude::{wasm_bindgen, JsValue},
    JsCast,
};

use crate::seo::{apply_page_meta, PageMeta};
use crate::zip_search::{NominatimPlace, ZipSearch, ZipStatus};

#[wasm_bindgen(module = "/maplibre_map.js")]
extern "C" {
    #[wasm_bindgen(js_name = initMap)]
    fn init_map();
    #[wasm_bindgen(js_name = updateRoute)]
    fn update_route_js(coords: JsValue, baseline: JsValue);
    #[wasm_bindgen(js_name = updateCameras)]
    fn update_cameras_js(cameras: JsValue);
    #[wasm_bindgen(js_name = updateSelectionMarkers)]
    fn update_selection_markers(origin: JsValue, destination: JsValue);
    #[wasm_bindgen(js_name = centerOn)]
    fn center_on(lat: f64, lon: f64, zoom: f64);
}

fn api_root() -> String {
    if let Some(url) = option_env!("FRONTEND_API_ROOT") {
        return url.trim_end_matches('/').to_string();
    }
    "http://localhost:3001".to_string()
}

const ZIP_ZOOM: f64 = 12.0;

pub struct Model {
    zip: ZipSearch,
    form: RouteForm,
    click_target: ClickTarget,
    pending: bool,
    last_response: Option<DirectionsResponse>,
    error: Option<String>,
}

#[derive(Clone, Copy, PartialEq, Debug)]
pub enum ClickTarget {
    Origin,
    Destination,
}

#[derive(Clone, Debug, PartialEq)]
struct RouteForm {
    origin: String,
    destination: String,
    mode: TravelMode,
    avoid_cameras: bool,
    compare: bool,
}

impl Default for RouteForm {
    fn default() -> Self {
        Self {
            origin: String::new(),
            destination: String::new(),
            mode: TravelMode::Car,
            avoid_cameras: true,
            compare: true,
        }
    }
}

impl RouteForm {
    fn to_request(&self) -> Result<DirectionsRequest, String> {
        let origin = parse_lat_lon(&self.origin).ok_or("Origin must look like `lat, lon`.")?;
        let destination =
            parse_lat_lon(&self.destination).ok_or("Destination must look like `lat, lon`.")?;
        if origin == destination {
            return Err("Origin and destination must differ.".to_string());
        }
        Ok(DirectionsRequest {
            origin,
            destination,
            waypoints: Vec::new(),
            mode: self.mode,
            avoid_cameras: self.avoid_cameras,
            compare: self.compare,
            include_gpx: false,
        })
    }
}

/// Parse `"lat, lon"` (comma and/or whitespace separated) into a valid
/// coordinate.
fn parse_lat_lon(raw: &str) -> Option<Coordinate> {
    let mut parts = raw
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|part| !part.is_empty());
    let lat = parts.next()?.parse::<f64>().ok()?;
    let lon = parts.next()?.parse::<f64>().ok()?;
    if parts.next().is_some() {
        return None;
    }
    let coord = Coordinate::new(lat, lon);
    coord.is_valid().then_some(coord)
}

fn format_coord(coord: Coordinate) -> String {
    format!("{:.5}, {:.5}", coord.lat, coord.lon)
}

pub enum Msg {
    ZipChanged(String),
    ZipSubmit,
    ZipFetched(Result<Vec<NominatimPlace>, String>),
    OriginChanged(String),
    DestinationChanged(String),
    ModeChanged(String),
    ToggleAvoid,
    ToggleCompare,
    SetClickTarget(ClickTarget),
    MapClicked { lat: f64, lon: f64 },
    MapMoved(Bounds),
    CamerasFetched(Result<CamerasResponse, String>),
    Submit,
    DirectionsFetched(Result<DirectionsResponse, String>),
}

pub fn init(_: Url, orders: &mut impl Orders<Msg>) -> Model {
    orders.stream(streams::window_event(Ev::from("map-click"), |event| {
        let event = event.dyn_into::<web_sys::CustomEvent>().ok()?;
        let payload: MapClickPayload = serde_wasm_bindgen::from_value(event.detail()).ok()?;
        Some(Msg::MapClicked {
            lat: payload.lat,
            lon: payload.lon,
        })
    }));
    orders.stream(streams::window_event(Ev::from("map-moved"), |event| {
        let event = event.dyn_into::<web_sys::CustomEvent>().ok()?;
        let bounds: Bounds = serde_wasm_bindgen::from_value(event.detail()).ok()?;
        Some(Msg::MapMoved(bounds))
    }));

    Model {
        zip: ZipSearch::default(),
        form: RouteForm::default(),
        click_target: ClickTarget::Origin,
        pending: false,
        last_response: None,
        error: None,
    }
}

pub fn update(msg: Msg, model: &mut Model, orders: &mut impl Orders<Msg>) {
    match msg {
        Msg::ZipChanged(val) => model.zip.set_query(val),
        Msg::ZipSubmit => {
            if let Some(url) = model.zip.begin() {
                orders.perform_cmd(fetch_zip(url));
            }
        }
        Msg::ZipFetched(outcome) => {
            if let Some(center) = model.zip.resolve(outcome) {
                center_on(center.lat, center.lon, ZIP_ZOOM);
                if model.form.origin.trim().is_empty() {
                    model.form.origin = format_coord(center);
                    sync_selection_markers(&model.form);
                }
            }
        }
        Msg::OriginChanged(val) => {
            model.form.origin = val;
            sync_selection_markers(&model.form);
        }
        Msg::DestinationChanged(val) => {
            model.form.destination = val;
            sync_selection_markers(&model.form);
        }
        Msg::ModeChanged(val) => {
            model.form.mode = match val.as_str() {
                "bike" => TravelMode::Bike,
                "foot" => TravelMode::Foot,
                _ => TravelMode::Car,
            };
        }
        Msg::ToggleAvoid => model.form.avoid_cameras = !model.form.avoid_cameras,
        Msg::ToggleCompare => model.form.compare = !model.form.compare,
        Msg::SetClickTarget(target) => model.click_target = target,
        Msg::MapClicked { lat, lon } => {
            let value = format_coord(Coordinate::new(lat, lon));
            match model.click_target {
                ClickTarget::Origin => {
                    model.form.origin = value;
                    model.click_target = ClickTarget::Destination;
                }
                ClickTarget::Destination => model.form.destination = value,
            }
            sync_selection_markers(&model.form);
        }
        Msg::MapMoved(bounds) => {
            orders.skip().perform_cmd(fetch_cameras(bounds));
        }
        Msg::CamerasFetched(Ok(response)) => push_cameras_to_map(&response.cameras),
        Msg::CamerasFetched(Err(err)) => {
            web_sys::console::warn_1(&format!("[flockhopper] camera fetch failed: {err}").into());
        }
        Msg::Submit => {
            if model.pending {
                return;
            }
            match model.form.to_request() {
                Ok(payload) => {
                    model.pending = true;
                    model.error = None;
                    orders.perform_cmd(send_directions_request(payload));
                }
                Err(err) => model.error = Some(err),
            }
        }
        Msg::DirectionsFetched(result) => {
            model.pending = false;
            match result {
                Ok(response) => {
                    push_route_to_map(&response.route, response.baseline.as_ref());
                    model.last_response = Some(response);
                    model.error = None;
                }
                Err(err) => {
                    push_route_to_map_empty();
                    model.last_response = None;
                    model.error = Some(err);
                }
            }
        }
    }
}

async fn fetch_zip(url: String) -> Msg {
    let outcome = match Request::new(url).fetch().await {
        Err(err) => Err(format!("{err:?}")),
        Ok(raw) => match raw.check_status() {
            Err(status_err) => Err(format!("{status_err:?}")),
            Ok(resp) => resp
                .json::<Vec<NominatimPlace>>()
                .await
                .map_err(|err| format!("{err:?}")),
        },
    };
    Msg::ZipFetched(outcome)
}

async fn fetch_cameras(bounds: Bounds) -> Msg {
    let url = format!(
        "{}/api/cameras?min_lat={}&max_lat={}&min_lon={}&max_lon={}",
        api_root(),
        bounds.min_lat,
        bounds.max_lat,
        bounds.min_lon,
        bounds.max_lon
    );
    Msg::CamerasFetched(fetch_api::<CamerasResponse>(Request::new(url)).await)
}

async fn send_directions_request(payload: DirectionsRequest) -> Msg {
    web_sys::console::debug_1(
        &format!(
            "[flockhopper] directions {:?} -> {:?} mode={}",
            payload.origin,
            payload.destination,
            payload.mode.profile()
        )
        .into(),
    );
    let url = format!("{}/api/directions", api_root());
    let response = match Request::new(url).method(Method::Post).json(&payload) {
        Err(err) => Err(format!("{err:?}")),
        Ok(request) => fetch_api::<DirectionsResponse>(request).await,
    };
    Msg::DirectionsFetched(response)
}

/// Fetch a backend endpoint, surfacing the `{ ok: false, error }` envelope
/// message on failure.
async fn fetch_api<T: for<'de> Deserialize<'de> + 'static>(request: Request<'_>) -> Result<T, String> {
    let raw = request.fetch().await.map_err(|err| format!("{err:?}"))?;
    if raw.status().is_ok() {
        raw.json::<T>().await.map_err(|err| format!("{err:?}"))
    } else {
        let code = raw.status().code;
        match raw.json::<ErrorBody>().await {
            Ok(body) => Err(body.error),
            Err(_) => Err(format!("request failed with status {code}")),
        }
    }
}

pub fn view(model: &Model) -> Node<Msg> {
    div![
        C!["landing"],
        view_hero(),
        view_how_it_works(),
        section![
            C!["planner"],
            id!["plan"],
            div![C!["map-preview"], id!["map"]],
            div![
                C!["planner-panel"],
                view_zip_search(&model.zip),
                view_form(model),
                view_result(model),
            ],
        ],
        view_footer(),
    ]
}

fn view_hero() -> Node<Msg> {
    section![
        C!["hero"],
        h1!["Get where you're going without feeding the plate readers"],
        p![
            "FlockHopper maps automated license plate reader cameras and plans routes \
             that pass as few of them as possible."
        ],
        a![C!["cta"], attrs! { At::Href => "#plan" }, "Plan a route"],
    ]
}

fn view_how_it_works() -> Node<Msg> {
    let step = |title: &str, body: &str| div![C!["step"], h3![title], p![body]];
    section![
        C!["how-it-works"],
        h2!["How it works"],
        div![
            C!["steps"],
            step(
                "1. Find your area",
                "Search a ZIP code or pan the map to see known cameras nearby."
            ),
            step(
                "2. Pick your trip",
                "Click the map or type coordinates for where you start and where you're headed."
            ),
            step(
                "3. Compare exposure",
                "See how many cameras each route passes and which ones point at you."
            ),
        ],
    ]
}

fn view_footer() -> Node<Msg> {
    footer![
        C!["footer"],
        p!["Camera locations come from OpenStreetMap contributors."],
        p!["Routes are computed by GraphHopper. Exposure counts are estimates."],
    ]
}

fn view_zip_search(zip: &ZipSearch) -> Node<Msg> {
    let loading = zip.status == ZipStatus::Loading;
    form![
        C!["zip-search"],
        ev(Ev::Submit, |event| {
            event.prevent_default();
            Msg::ZipSubmit
        }),
        label![attrs! { At::For => "zip" }, "ZIP code"],
        input![
            id!["zip"],
            attrs! {
                At::Value => zip.query,
                At::Placeholder => "e.g. 30303",
                At::from("inputmode") => "numeric",
                At::AutoComplete => "postal-code",
            },
            input_ev(Ev::Input, Msg::ZipChanged),
        ],
        button![
            attrs! { At::Type => "submit", At::Disabled => bool_attr(loading) },
            if loading { "Searching…" } else { "Search" },
        ],
        zip.message().map(|text| {
            let class = match zip.status {
                ZipStatus::Invalid | ZipStatus::NotFound | ZipStatus::Failed(_) => "error",
                _ => "hint",
            };
            p![C![class], text]
        }),
    ]
}

fn view_form(model: &Model) -> Node<Msg> {
    let coord_field = |label: &str, value: &str, msg: fn(String) -> Msg, target: ClickTarget| {
        div![
            C!["input-field"],
            label![
                input![
                    attrs! {
                        At::Type => "radio",
                        At::Name => "click-target",
                        At::Checked => bool_attr(model.click_target == target),
                    },
                    ev(Ev::Change, move |_| Msg::SetClickTarget(target)),
                ],
                span![label],
            ],
            input![
                attrs! {
                    At::Value => value,
                    At::Placeholder => "lat, lon",
                    At::AutoComplete => "off",
                    At::SpellCheck => "false",
                },
                input_ev(Ev::Input, msg),
            ],
        ]
    };
    let mode_option = |value: &str, text: &str, mode: TravelMode| {
        option![
            attrs! {
                At::Value => value,
                At::Selected => bool_attr(model.form.mode == mode),
            },
            text
        ]
    };

    form![
        C!["controls"],
        fieldset![
            legend!["Trip"],
            coord_field(
                "Start",
                &model.form.origin,
                Msg::OriginChanged,
                ClickTarget::Origin
            ),
            coord_field(
                "Destination",
                &model.form.destination,
                Msg::DestinationChanged,
                ClickTarget::Destination
            ),
            small!["Select a field, then click the map to fill it."],
        ],
        fieldset![
            legend!["Options"],
            select![
                mode_option("car", "Driving", TravelMode::Car),
                mode_option("bike", "Cycling", TravelMode::Bike),
                mode_option("foot", "Walking", TravelMode::Foot),
                input_ev(Ev::Change, Msg::ModeChanged),
            ],
            label![
                input![
                    attrs! {
                        At::Type => "checkbox",
                        At::Checked => bool_attr(model.form.avoid_cameras),
                    },
                    ev(Ev::Change, |_| Msg::ToggleAvoid),
                ],
                span!["Avoid cameras"],
            ],
            label![
                input![
                    attrs! {
                        At::Type => "checkbox",
                        At::Checked => bool_attr(model.form.compare),
                    },
                    ev(Ev::Change, |_| Msg::ToggleCompare),
                ],
                span!["Compare with the fastest route"],
            ],
        ],
        button![
            if model.pending { "Routing…" } else { "Find route" },
            ev(Ev::Click, |event| {
                event.prevent_default();
                Msg::Submit
            }),
            attrs! { At::Disabled => bool_attr(model.pending) },
        ],
        model.error.as_ref().map(|error| p![C!["error"], error]),
    ]
}

fn view_result(model: &Model) -> Node<Msg> {
    let Some(response) = &model.last_response else {
        return div![
            C!["result"],
            p!["Pick a start and a destination to see camera exposure."]
        ];
    };

    div![
        C!["result"],
        view_analysis("Suggested route", &response.route),
        response
            .baseline
            .as_ref()
            .map(|baseline| view_analysis("Fastest route", baseline)),
        response.baseline.as_ref().map(|baseline| {
            let saved = baseline
                .exposure
                .total
                .saturating_sub(response.route.exposure.total);
            p![C!["savings"], savings_text(saved)]
        }),
    ]
}

fn view_analysis(title: &str, analysis: &RouteAnalysis) -> Node<Msg> {
    let card = |label: &str, content: String| {
        div![
            C!["metadata-card"],
            span![C!["label"], label],
            strong![content],
        ]
    };
    let route = &analysis.route;

    div![
        C!["analysis"],
        h3![title],
        div![
            C!["metadata-grid"],
            card("Distance", format_distance(route.distance_m)),
            card("Time", format_duration(route.duration_s)),
            card("Cameras", analysis.exposure.total.to_string()),
            card("Facing you", analysis.exposure.facing.to_string()),
        ],
        view_breakdown(&analysis.exposure),
    ]
}

fn view_breakdown(exposure: &ExposureSummary) -> Node<Msg> {
    if exposure.total == 0 {
        return p![C!["hint"], "No known cameras along this route."];
    }
    let mut rows: Vec<_> = exposure.by_operator.iter().collect();
    rows.sort_by(|a, b| b.1.cmp(a.1).then(a.0.cmp(b.0)));

    div![
        C!["breakdown"],
        h4!["By operator"],
        ul![rows
            .into_iter()
            .map(|(operator, count)| li![format!("{operator}: {count}")])],
        IF!(exposure.facing_unknown > 0 => small![format!(
            "{} camera(s) have no recorded direction.",
            exposure.facing_unknown
        )]),
    ]
}

fn savings_text(saved: usize) -> String {
    match saved {
        0 => "This route passes as many cameras as the fastest one.".to_string(),
        1 => "Avoids 1 camera compared to the fastest route.".to_string(),
        n => format!("Avoids {n} cameras compared to the fastest route."),
    }
}

fn format_distance(meters: f64) -> String {
    let miles = meters / 1_609.344;
    if miles < 0.1 {
        format!("{:.0} ft", meters * 3.280_84)
    } else {
        format!("{miles:.1} mi")
    }
}

fn format_duration(seconds: f64) -> String {
    let minutes = (seconds / 60.0).round() as u64;
    if minutes < 60 {
        format!("{} min", minutes.max(1))
    } else {
        format!("{} h {:02} min", minutes / 60, minutes % 60)
    }
}

#[wasm_bindgen(start)]
pub fn start() {
    apply_page_meta(&PageMeta::default());
    init_map();
    App::start("app", init, update, view);
}

fn push_route_to_map(route: &RouteAnalysis, baseline: Option<&RouteAnalysis>) {
    let path = to_value(&route.route.path).unwrap_or(JsValue::NULL);
    let baseline_path = baseline
        .and_then(|b| to_value(&b.route.path).ok())
        .unwrap_or(JsValue::NULL);
    update_route_js(path, baseline_path);

    let cameras: Vec<&Camera> = route.cameras.iter().map(|c| &c.camera).collect();
    if let Ok(value) = to_value(&cameras) {
        update_cameras_js(value);
    }
}

fn push_route_to_map_empty() {
    update_route_js(JsValue::NULL, JsValue::NULL);
}

fn push_cameras_to_map(cameras: &[Camera]) {
    if let Ok(value) = to_value(cameras) {
        update_cameras_js(value);
    }
}

fn sync_selection_markers(form: &RouteForm) {
    let as_js = |raw: &str| {
        parse_lat_lon(raw)
            .and_then(|coord| to_value(&coord).ok())
            .unwrap_or(JsValue::NULL)
    };
    update_selection_markers(as_js(&form.origin), as_js(&form.destination));
}

fn bool_attr(value: bool) -> AtValue {
    if value {
        AtValue::Some("true".into())
    } else {
        AtValue::Ignored
    }
}

#[derive(Deserialize)]
struct MapClickPayload {
    lat: f64,
    lon: f64,
}
