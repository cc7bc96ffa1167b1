//! Leptos component wrapping the graph widget.
//!
//! The component owns a [`GraphWidget`], draws it on a canvas through a
//! `requestAnimationFrame` loop and mirrors its panel state (legend, item
//! info, layout buttons) into signals. Widget -> host updates are posted to
//! the parent window; host messages are received through the window's
//! `message` event.

use std::cell::RefCell;
use std::rc::Rc;

use leptos::prelude::*;
use log::{debug, warn};
use wasm_bindgen::prelude::*;
use web_sys::{
	CanvasRenderingContext2d, HtmlAnchorElement, HtmlCanvasElement, KeyboardEvent, MessageEvent, MouseEvent, WheelEvent,
	Window,
};

use super::export::ExportFormat;
use super::info::{InfoEntry, InfoTab, ItemInfo, filter_search_options, spinner_frame};
use super::interaction::EntityKind;
use super::layout::LayoutControls;
use super::render::{self, Overlay};
use super::scale::Range;
use super::sync::{HostMessage, HostSink, HostState, StatePatch};
use super::visual::{LegendBody, LegendSection};
use super::widget::{GraphWidget, MessageOutcome};

use crate::config::WidgetConfig;
use crate::error::Result;

/// Pointer travel under which a press/release pair counts as a click.
const CLICK_TOLERANCE: f64 = 3.0;
/// Matches listed under the search box.
const SEARCH_RESULTS: usize = 20;

type SharedWidget = StoredValue<Rc<RefCell<GraphWidget>>, LocalStorage>;

fn now() -> f64 {
	js_sys::Date::now()
}

/// Posts patches to the embedding page as `{"msg": "sync", "patches": [...]}`.
#[derive(Debug, Default)]
pub struct PostMessageSink;

impl HostSink for PostMessageSink {
	fn sync(&mut self, patches: Vec<StatePatch>) {
		let message = serde_json::json!({ "msg": "sync", "patches": patches });
		let Some(parent) = web_sys::window().and_then(|w| w.parent().ok().flatten()) else {
			warn!("no parent window to sync with");
			return;
		};
		let posted = js_sys::JSON::parse(&message.to_string()).and_then(|value| parent.post_message(&value, "*"));
		if let Err(e) = posted {
			warn!("failed to post host update: {e:?}");
		}
	}
}

/// Panel state mirrored from the widget after every interaction.
#[derive(Clone, Copy)]
struct Panels {
	legend: RwSignal<Vec<LegendSection>>,
	info: RwSignal<Option<ItemInfo>>,
	tab: RwSignal<InfoTab>,
	search: RwSignal<String>,
	controls: RwSignal<LayoutControls>,
	spinner: RwSignal<char>,
	error: RwSignal<Option<String>>,
}

impl Panels {
	fn new(widget: &GraphWidget) -> Self {
		Self {
			legend: RwSignal::new(widget.legend()),
			info: RwSignal::new(widget.selected_info()),
			tab: RwSignal::new(widget.tab()),
			search: RwSignal::new(widget.search_value().unwrap_or_default().to_string()),
			controls: RwSignal::new(widget.controls()),
			spinner: RwSignal::new(spinner_frame(0.0)),
			error: RwSignal::new(None),
		}
	}

	fn refresh(&self, widget: &GraphWidget) {
		self.legend.set(widget.legend());
		self.info.set(widget.selected_info());
		self.tab.set(widget.tab());
		self.search.set(widget.search_value().unwrap_or_default().to_string());
		self.controls.set(widget.controls());
	}
}

/// Runs a widget action, surfaces its error and refreshes the panels.
fn apply(shared: SharedWidget, panels: Panels, action: impl FnOnce(&mut GraphWidget, f64) -> Result<()>) {
	shared.with_value(|widget| {
		let mut widget = widget.borrow_mut();
		if let Err(e) = action(&mut widget, now()) {
			warn!("{e}");
			panels.error.set(Some(e.to_string()));
		}
		panels.refresh(&widget);
	});
}

#[derive(Default)]
struct Pointer {
	down: Option<(f64, f64)>,
	last: (f64, f64),
	moved: bool,
	hovered: Option<usize>,
}

fn viewport_point(canvas: &HtmlCanvasElement, ev: &MouseEvent) -> (f64, f64) {
	let rect = canvas.get_bounding_client_rect();
	(ev.client_x() as f64 - rect.left(), ev.client_y() as f64 - rect.top())
}

fn overlay(widget: &GraphWidget, hovered: Option<usize>) -> Overlay {
	Overlay {
		hovered,
		selected: widget
			.state()
			.selected_node
			.as_deref()
			.and_then(|key| widget.graph().node_index(key)),
	}
}

/// Sizes the canvas to its parent and tells the widget.
fn fit_canvas(canvas: &HtmlCanvasElement, widget: &mut GraphWidget) {
	let (w, h) = canvas
		.parent_element()
		.map(|p| (p.client_width() as f64, p.client_height() as f64))
		.filter(|(w, h)| *w > 0.0 && *h > 0.0)
		.unwrap_or_else(|| widget.viewport());
	canvas.set_width(w as u32);
	canvas.set_height(h as u32);
	widget.resize(w, h);
}

fn render_now(widget: &GraphWidget, ctx: &CanvasRenderingContext2d, hovered: Option<usize>) {
	render::render(
		ctx,
		widget.graph(),
		&widget.frame(),
		&widget.projection(),
		widget.theme(),
		overlay(widget, hovered),
	);
}

/// Triggers a browser download of `href`.
fn download(href: &str, file_name: &str) {
	let Some(document) = web_sys::window().and_then(|w| w.document()) else {
		return;
	};
	match document.create_element("a").map(|a| a.dyn_into::<HtmlAnchorElement>()) {
		Ok(Ok(anchor)) => {
			anchor.set_href(href);
			anchor.set_download(file_name);
			anchor.click();
		}
		_ => warn!("could not create download link for {file_name}"),
	}
}

fn export(widget: &GraphWidget, canvas: Option<HtmlCanvasElement>, format: ExportFormat) -> Result<()> {
	let href = match widget.export(format)? {
		Some(text) => format!(
			"data:{};charset=utf-8,{}",
			format.mime(),
			String::from(js_sys::encode_uri_component(&text))
		),
		None => match canvas.map(|c| c.to_data_url()) {
			Some(Ok(url)) => url,
			_ => {
				warn!("canvas unavailable for {}", format.file_name());
				return Ok(());
			}
		},
	};
	download(&href, &format.file_name());
	Ok(())
}

/// Interactive graph explorer: canvas, controls and side panel.
///
/// Fails soft: if the host state cannot be turned into a widget, an error
/// panel is shown instead.
#[component]
pub fn GraphView(host: HostState, #[prop(optional)] config: WidgetConfig) -> impl IntoView {
	match GraphWidget::new(host, config, Box::new(PostMessageSink)) {
		Ok(widget) => graph_view(widget).into_any(),
		Err(e) => {
			warn!("could not build graph widget: {e}");
			view! { <div class="ge-error">{format!("Could not display graph: {e}")}</div> }.into_any()
		}
	}
}

fn graph_view(widget: GraphWidget) -> impl IntoView {
	let panels = Panels::new(&widget);
	let description = widget.description();
	let search_options = widget.search_options();
	let placeholder = widget.placeholder();
	let height = widget.height();

	let widget = Rc::new(RefCell::new(widget));
	let shared: SharedWidget = StoredValue::new_local(widget.clone());
	let pointer: Rc<RefCell<Pointer>> = Rc::new(RefCell::new(Pointer::default()));
	let fullscreen = RwSignal::new(false);

	let canvas_ref = NodeRef::<leptos::html::Canvas>::new();
	let container_ref = NodeRef::<leptos::html::Div>::new();
	let animate: Rc<RefCell<Option<Closure<dyn FnMut()>>>> = Rc::new(RefCell::new(None));
	let resize_cb: Rc<RefCell<Option<Closure<dyn FnMut()>>>> = Rc::new(RefCell::new(None));
	let message_cb: Rc<RefCell<Option<Closure<dyn FnMut(MessageEvent)>>>> = Rc::new(RefCell::new(None));

	let (widget_init, pointer_init) = (widget.clone(), pointer.clone());
	Effect::new(move |_| {
		let Some(canvas) = canvas_ref.get() else {
			return;
		};
		let canvas: HtmlCanvasElement = canvas.into();
		let Some(window): Option<Window> = web_sys::window() else {
			return;
		};
		let ctx: CanvasRenderingContext2d = match canvas.get_context("2d").map(|c| c.map(|c| c.dyn_into())) {
			Ok(Some(Ok(ctx))) => ctx,
			_ => {
				panels.error.set(Some("canvas 2d context unavailable".to_string()));
				return;
			}
		};
		fit_canvas(&canvas, &mut widget_init.borrow_mut());

		let (widget_resize, canvas_resize) = (widget_init.clone(), canvas.clone());
		*resize_cb.borrow_mut() = Some(Closure::new(move || {
			fit_canvas(&canvas_resize, &mut widget_resize.borrow_mut());
		}));
		if let Some(ref cb) = *resize_cb.borrow() {
			let _ = window.add_event_listener_with_callback("resize", cb.as_ref().unchecked_ref());
		}

		let (widget_msg, pointer_msg, canvas_msg, ctx_msg) =
			(widget_init.clone(), pointer_init.clone(), canvas.clone(), ctx.clone());
		*message_cb.borrow_mut() = Some(Closure::new(move |ev: MessageEvent| {
			let text = match js_sys::JSON::stringify(&ev.data()) {
				Ok(text) => String::from(text),
				Err(_) => return,
			};
			let Ok(message) = serde_json::from_str::<HostMessage>(&text) else {
				debug!("ignoring foreign message");
				return;
			};
			let mut w = widget_msg.borrow_mut();
			match w.handle_message(&message) {
				Ok(MessageOutcome::Applied) => panels.refresh(&w),
				Ok(MessageOutcome::SnapshotRequested) => {
					render_now(&w, &ctx_msg, pointer_msg.borrow().hovered);
					match canvas_msg.to_data_url() {
						Ok(url) => w.save_snapshot(url),
						Err(e) => warn!("snapshot failed: {e:?}"),
					}
				}
				Err(e) => {
					warn!("{e}");
					panels.refresh(&w);
					panels.error.set(Some(e.to_string()));
				}
			}
		}));
		if let Some(ref cb) = *message_cb.borrow() {
			let _ = window.add_event_listener_with_callback("message", cb.as_ref().unchecked_ref());
		}

		let (widget_anim, pointer_anim, animate_inner) = (widget_init.clone(), pointer_init.clone(), animate.clone());
		let started = now();
		*animate.borrow_mut() = Some(Closure::new(move || {
			let t = now();
			{
				let mut w = widget_anim.borrow_mut();
				w.tick(t);
				render_now(&w, &ctx, pointer_anim.borrow().hovered);

				let controls = w.controls();
				if panels.controls.get_untracked() != controls {
					panels.controls.set(controls);
				}
				if controls.spinner() {
					let frame = spinner_frame(t - started);
					if panels.spinner.get_untracked() != frame {
						panels.spinner.set(frame);
					}
				}
			}
			if let Some(ref cb) = *animate_inner.borrow() {
				if let Some(window) = web_sys::window() {
					let _ = window.request_animation_frame(cb.as_ref().unchecked_ref());
				}
			}
		}));
		if let Some(ref cb) = *animate.borrow() {
			let _ = window.request_animation_frame(cb.as_ref().unchecked_ref());
		}
	});

	let pointer_md = pointer.clone();
	let on_mousedown = move |ev: MouseEvent| {
		let Some(canvas) = canvas_ref.get() else {
			return;
		};
		let point = viewport_point(&canvas.into(), &ev);
		let mut p = pointer_md.borrow_mut();
		p.down = Some(point);
		p.last = point;
		p.moved = false;
	};

	let (widget_mm, pointer_mm) = (widget.clone(), pointer.clone());
	let on_mousemove = move |ev: MouseEvent| {
		let Some(canvas) = canvas_ref.get() else {
			return;
		};
		let canvas: HtmlCanvasElement = canvas.into();
		let (x, y) = viewport_point(&canvas, &ev);
		let mut p = pointer_mm.borrow_mut();
		let mut w = widget_mm.borrow_mut();

		if let Some((sx, sy)) = p.down {
			if !p.moved && ((x - sx).powi(2) + (y - sy).powi(2)).sqrt() > CLICK_TOLERANCE {
				p.moved = true;
			}
			if p.moved {
				w.pan(x - p.last.0, y - p.last.1, now());
			}
			p.last = (x, y);
			return;
		}

		let frame = w.frame();
		p.hovered = w.node_at(&frame, x, y);
		let over_edge = p.hovered.is_none() && w.edge_at(&frame, x, y).is_some();
		let cursor = if p.hovered.is_some() || over_edge { "pointer" } else { "default" };
		let _ = web_sys::HtmlElement::style(&canvas).set_property("cursor", cursor);
	};

	let (widget_mu, pointer_mu) = (widget.clone(), pointer.clone());
	let on_mouseup = move |ev: MouseEvent| {
		let Some(canvas) = canvas_ref.get() else {
			return;
		};
		let (x, y) = viewport_point(&canvas.into(), &ev);
		let clicked = {
			let mut p = pointer_mu.borrow_mut();
			let clicked = p.down.is_some() && !p.moved;
			p.down = None;
			p.moved = false;
			clicked
		};
		if !clicked {
			return;
		}

		let target = {
			let w = widget_mu.borrow();
			let frame = w.frame();
			match w.node_at(&frame, x, y) {
				Some(node) => Some((EntityKind::Node, w.graph().node(node).key.clone())),
				None => w
					.edge_at(&frame, x, y)
					.map(|edge| (EntityKind::Edge, w.graph().edge(edge).key.clone())),
			}
		};
		apply(shared, panels, move |w, _| match target {
			Some((EntityKind::Node, key)) => w.click_node(&key),
			Some((EntityKind::Edge, key)) => w.click_edge(&key),
			None => {
				w.click_stage();
				Ok(())
			}
		});
	};

	let pointer_ml = pointer.clone();
	let on_mouseleave = move |_: MouseEvent| {
		let mut p = pointer_ml.borrow_mut();
		p.down = None;
		p.moved = false;
		p.hovered = None;
	};

	let widget_wh = widget.clone();
	let on_wheel = move |ev: WheelEvent| {
		ev.prevent_default();
		let Some(canvas) = canvas_ref.get() else {
			return;
		};
		let (x, y) = viewport_point(&canvas.into(), &ev);
		widget_wh.borrow_mut().wheel(x, y, ev.delta_y(), now());
	};

	let toggle_fullscreen = move |_: MouseEvent| {
		let entering = !fullscreen.get_untracked();
		if let Some(container) = container_ref.get() {
			if entering {
				let _ = container.request_fullscreen();
			} else if let Some(document) = web_sys::window().and_then(|w| w.document()) {
				document.exit_fullscreen();
			}
		}
		fullscreen.set(entering);
		if let Some(canvas) = canvas_ref.get() {
			shared.with_value(|w| fit_canvas(&canvas.into(), &mut w.borrow_mut()));
		}
	};

	let download_button = move |format: ExportFormat| {
		view! {
			<button
				title=format!("download as {}", format.file_name())
				on:click=move |_| {
					let canvas = canvas_ref.get().map(Into::into);
					apply(shared, panels, move |w, _| export(w, canvas, format));
				}
			>
				{format.name()}
			</button>
		}
	};

	let query = RwSignal::new(String::new());
	let search_options = StoredValue::new(search_options);
	let matches = move || {
		let query = query.get();
		search_options.with_value(|all| {
			filter_search_options(all, &query, SEARCH_RESULTS)
				.into_iter()
				.cloned()
				.collect::<Vec<_>>()
		})
	};
	let pick = move |key: String| {
		query.set(String::new());
		apply(shared, panels, move |w, t| w.search_select(Some(&key), t));
	};

	view! {
		<div
			node_ref=container_ref
			class="graph-explorer"
			style=move || {
				if fullscreen.get() { "height: 100%;".to_string() } else { format!("height: {height}px;") }
			}
		>
			<div class="ge-stage">
				<canvas
					node_ref=canvas_ref
					on:mousedown=on_mousedown
					on:mousemove=on_mousemove
					on:mouseup=on_mouseup
					on:mouseleave=on_mouseleave
					on:wheel=on_wheel
					style="display: block;"
				/>
			</div>

			<div class="ge-controls">
				<button
					title=move || if fullscreen.get() { "exit fullscreen" } else { "enter fullscreen" }
					on:click=toggle_fullscreen
				>
					"⛶"
				</button>
				<button title="zoom" on:click=move |_| apply(shared, panels, |w, t| { w.zoom(t); Ok(()) })>"+"</button>
				<button title="unzoom" on:click=move |_| apply(shared, panels, |w, t| { w.unzoom(t); Ok(()) })>"−"</button>
				<button title="reset zoom" on:click=move |_| apply(shared, panels, |w, t| { w.reset_zoom(t); Ok(()) })>"⊙"</button>
				<button
					title=move || if panels.controls.get().layout_running { "stop layout" } else { "start layout" }
					disabled=move || !panels.controls.get().layout_enabled
					on:click=move |_| apply(shared, panels, |w, _| w.toggle_layout())
				>
					{move || if panels.controls.get().layout_running { panels.spinner.get().to_string() } else { "▶".to_string() }}
				</button>
				<button
					title=move || if panels.controls.get().noverlap_running { "stop noverlap" } else { "start noverlap" }
					disabled=move || !panels.controls.get().noverlap_enabled
					on:click=move |_| apply(shared, panels, |w, _| w.toggle_noverlap())
				>
					{move || if panels.controls.get().noverlap_running { panels.spinner.get().to_string() } else { "◎".to_string() }}
				</button>
				<Show when=move || panels.controls.get().reset_visible>
					<button title="reset layout" on:click=move |_| apply(shared, panels, |w, t| w.reset_layout(t))>"↺"</button>
				</Show>
				<span class="ge-download">
					{ExportFormat::ALL.into_iter().map(download_button).collect_view()}
				</span>
			</div>

			<div class="ge-panel">
				<div class="ge-search">
					<input
						type="search"
						placeholder=move || {
							let selected = panels.search.get();
							if selected.is_empty() { "Search a node...".to_string() } else { selected }
						}
						prop:value=move || query.get()
						on:input=move |ev| query.set(event_target_value(&ev))
						on:keydown=move |ev: KeyboardEvent| {
							if ev.key() == "Enter" {
								if let Some(first) = matches().into_iter().next() {
									pick(first.key);
								}
							} else if ev.key() == "Escape" {
								query.set(String::new());
							}
						}
					/>
					<Show when=move || !panels.search.get().is_empty()>
						<button
							title="clear selection"
							on:click=move |_| apply(shared, panels, |w, t| w.search_select(None, t))
						>
							"×"
						</button>
					</Show>
					<ul class="ge-search-results">
						{move || {
							matches()
								.into_iter()
								.map(|option| {
									let text = option.text();
									let key = option.key;
									view! { <li on:click=move |_| pick(key.clone())>{text}</li> }
								})
								.collect_view()
						}}
					</ul>
				</div>

				<div class="ge-tabs">
					<button
						class:selectable=move || panels.tab.get() != InfoTab::Legend
						on:click=move |_| apply(shared, panels, |w, _| { w.select_tab(InfoTab::Legend); Ok(()) })
					>
						"Legend"
					</button>
					<button
						class:selectable=move || panels.tab.get() != InfoTab::Info
						on:click=move |_| apply(shared, panels, |w, _| { w.select_tab(InfoTab::Info); Ok(()) })
					>
						"Info"
					</button>
				</div>

				<div class="ge-description">
					<b>{description.title}</b>
					<div>"Nodes: " {description.nodes}</div>
					<div>"Edges: " {description.edges}</div>
				</div>

				{move || match panels.tab.get() {
					InfoTab::Legend => panels
						.legend
						.get()
						.into_iter()
						.map(|section| legend_view(section, shared, panels))
						.collect_view()
						.into_any(),
					InfoTab::Info => info_view(panels.info.get(), placeholder).into_any(),
				}}
			</div>

			<Show when=move || panels.error.get().is_some()>
				<div class="ge-error" on:click=move |_| panels.error.set(None)>
					{move || panels.error.get().unwrap_or_default()}
				</div>
			</Show>
		</div>
	}
}

fn legend_view(section: LegendSection, shared: SharedWidget, panels: Panels) -> impl IntoView {
	let kind = section.kind;
	let body = match section.body {
		LegendBody::Dependent(endpoint) => {
			view! { <span class="ge-muted">{format!("based on {} node", endpoint.as_str())}</span> }.into_any()
		}
		LegendBody::Raw { name, source } => {
			view! { <span>{name} " " <em>{format!("({})", source.as_str())}</em></span> }.into_any()
		}
		LegendBody::Continuous { name, source, range } => {
			let scale = match range {
				Range::Numeric([min, max]) => view! { <span>{format!("{min} to {max} px")}</span> }.into_any(),
				Range::Color([from, to]) => view! {
					<span class="ge-gradient" style=format!("background: linear-gradient(to right, {from}, {to});")></span>
				}
				.into_any(),
			};
			view! { <span>{name} " " <em>{format!("({})", source.as_str())}</em></span> {scale} }.into_any()
		}
		LegendBody::Category {
			name,
			source,
			items,
			overflow,
			fallback,
		} => {
			let items = items
				.into_iter()
				.map(|item| {
					let value = item.value.clone();
					view! {
						<li
							class="ge-category selectable"
							class:evicted=item.evicted
							on:click=move |_| {
								let value = value.clone();
								apply(shared, panels, move |w, _| { w.toggle_category(kind, value); Ok(()) });
							}
						>
							<span class="ge-swatch" style=format!("background: {};", item.color)></span>
							{item.value.to_string()}
						</li>
					}
				})
				.collect_view();
			let extra = match (overflow, fallback) {
				(Some(color), _) => view! { <li><span class="ge-swatch" style=format!("background: {color};")></span>"..."</li> }.into_any(),
				(None, Some(color)) => view! { <li><span class="ge-swatch" style=format!("background: {color};")></span>"default"</li> }.into_any(),
				(None, None) => ().into_any(),
			};
			view! {
				<span>{name} " " <em>{format!("({})", source.as_str())}</em></span>
				<ul>{items} {extra}</ul>
			}
			.into_any()
		}
	};
	view! {
		<div class="ge-legend-section">
			<h3>{section.title}</h3>
			{body}
		</div>
	}
}

fn entries_view(title: &'static str, entries: Vec<InfoEntry>) -> AnyView {
	if entries.is_empty() {
		return ().into_any();
	}
	view! {
		<h3>{title}</h3>
		<ul>
			{entries
				.into_iter()
				.map(|e| view! { <li><b>{e.name}</b> " " {e.value.to_string()}</li> })
				.collect_view()}
		</ul>
	}
	.into_any()
}

fn info_view(info: Option<ItemInfo>, placeholder: &'static str) -> AnyView {
	let Some(info) = info else {
		return view! { <p class="ge-muted">{placeholder}</p> }.into_any();
	};
	let header = match (info.kind, info.extremities) {
		(EntityKind::Node, _) => view! { <p>"Node " <b>{info.key}</b></p> }.into_any(),
		(EntityKind::Edge, extremities) => {
			let (source, target) = extremities.unwrap_or_default();
			view! { <p>"Edge " <b>{info.key}</b> " from " <b>{source}</b> " to " <b>{target}</b></p> }.into_any()
		}
	};
	view! {
		<div class="ge-info">
			{header}
			{entries_view("From kwargs", info.kwargs)}
			{entries_view("Attributes", info.attributes)}
			{entries_view("Known viz data", info.viz)}
			{entries_view("Computed metrics", info.metrics)}
		</div>
	}
	.into_any()
}
