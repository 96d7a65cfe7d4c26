//! MindMesh Viewer - native host for the graph widget
//!
//! Usage:
//!   mindmesh-viewer --demo
//!   mindmesh-viewer --url https://<project>.supabase.co --api-key <key> --program 3778
//!   mindmesh-viewer --url ... --user <uid> --mesh <mesh-id>

use clap::Parser;
use eframe::egui;
use mindmesh_graph::graph::LevelBucket;
use mindmesh_graph::{
    ApiClient, BackingStore, InMemoryStore, MindMeshConfig, MindMeshWidget, ProgramSummary, Scope,
};
use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::Arc;
use tracing::{error, info};

const TOAST_SECONDS: f64 = 4.0;

#[derive(Parser, Debug)]
#[command(name = "mindmesh-viewer")]
#[command(about = "Explore a course prerequisite graph")]
struct Args {
    /// Backing store base URL (PostgREST)
    #[arg(long)]
    url: Option<String>,

    /// API key sent as `apikey` and bearer token
    #[arg(long)]
    api_key: Option<String>,

    /// Program code to load
    #[arg(long, short = 'p')]
    program: Option<String>,

    /// Program course codes, comma separated
    #[arg(long, value_delimiter = ',')]
    courses: Vec<String>,

    /// Owner of a saved MindMesh
    #[arg(long)]
    user: Option<String>,

    /// Saved MindMesh id (selects the user item set scope)
    #[arg(long)]
    mesh: Option<String>,

    /// YAML file overriding the embedded configuration
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Use the built-in in-memory data instead of a remote store
    #[arg(long)]
    demo: bool,
}

impl Args {
    fn scope(&self) -> Scope {
        match &self.mesh {
            Some(mesh_id) => Scope::UserItemSet {
                user_id: self.user.clone().unwrap_or_default(),
                mesh_id: mesh_id.clone(),
            },
            None => Scope::NamedProgram {
                code: self.program.clone().unwrap_or_else(|| "3778".into()),
                courses: self.courses.clone(),
            },
        }
    }

    fn backend(&self) -> Arc<dyn BackingStore> {
        match (&self.url, self.demo) {
            (Some(url), false) => {
                let mut client = ApiClient::new(url);
                if let Some(key) = &self.api_key {
                    client = client.with_api_key(key.clone());
                }
                info!(url = %url, "using HTTP backing store");
                Arc::new(client)
            }
            _ => {
                info!("using in-memory demo store");
                Arc::new(InMemoryStore::demo())
            }
        }
    }

    fn load_config(&self) -> Result<MindMeshConfig, mindmesh_graph::ConfigError> {
        match &self.config {
            Some(path) => MindMeshConfig::from_yaml_file(path),
            None => Ok(MindMeshConfig::embedded()),
        }
    }
}

// =============================================================================
// APP
// =============================================================================

struct Toast {
    text: String,
    expires_at: f64,
}

struct ViewerApp {
    widget: MindMeshWidget,
    details: Rc<RefCell<Option<String>>>,
    toasts: Vec<Toast>,
}

impl ViewerApp {
    fn new(mut widget: MindMeshWidget) -> Self {
        let details = Rc::new(RefCell::new(None));
        let sink = Rc::clone(&details);
        widget.set_on_node_focused(move |node| {
            let mut text = format!("{}\n{}", node.id, node.label);
            if let Some(subtitle) = node.subtitle() {
                text.push_str(&format!("\n{subtitle}"));
            }
            if let Some(faculty) = &node.metadata.faculty {
                text.push_str(&format!("\nFaculty: {faculty}"));
            }
            if let Some(school) = &node.metadata.school {
                text.push_str(&format!("\nSchool: {school}"));
            }
            *sink.borrow_mut() = Some(text);
        });
        Self {
            widget,
            details,
            toasts: Vec::new(),
        }
    }

    fn render_controls(&mut self, ui: &mut egui::Ui) {
        ui.heading("MindMesh");
        ui.label(self.widget.scope().to_string());
        ui.separator();

        ui.horizontal_wrapped(|ui| {
            if ui.button("Back").clicked() {
                self.widget.back();
            }
            if ui.button("Home").clicked() {
                self.widget.home();
            }
            if ui.button("Fit").clicked() {
                self.widget.fit();
            }
            let freeze_label = if self.widget.is_frozen() {
                "Unfreeze"
            } else {
                "Freeze"
            };
            if ui.button(freeze_label).clicked() {
                self.widget.toggle_freeze();
            }
        });
        ui.horizontal_wrapped(|ui| {
            if ui.button("Auto layout").clicked() {
                self.widget.auto_layout();
            }
            if ui.button("Reset layout").clicked() {
                self.widget.reset_layout();
            }
            if ui.button("Reload").clicked() {
                self.widget.reload();
            }
        });

        if self.widget.is_loading() {
            ui.horizontal(|ui| {
                ui.spinner();
                ui.label("Loading...");
            });
        }

        if let Some(summary) = self.widget.summary() {
            ui.separator();
            render_summary(ui, &summary);
        }

        if let Some(details) = self.details.borrow().as_ref() {
            ui.separator();
            ui.strong("Details");
            ui.label(details.as_str());
        }
    }

    fn render_toasts(&mut self, ctx: &egui::Context) {
        let now = ctx.input(|i| i.time);
        self.toasts.retain(|t| t.expires_at > now);
        if self.toasts.is_empty() {
            return;
        }

        egui::Area::new(egui::Id::new("mindmesh_toasts"))
            .anchor(egui::Align2::RIGHT_BOTTOM, egui::vec2(-12.0, -12.0))
            .order(egui::Order::Foreground)
            .show(ctx, |ui| {
                for toast in &self.toasts {
                    egui::Frame::popup(ui.style()).show(ui, |ui| {
                        ui.colored_label(egui::Color32::from_rgb(248, 113, 113), toast.text.as_str());
                    });
                }
            });
        ctx.request_repaint_after(std::time::Duration::from_millis(250));
    }
}

fn render_summary(ui: &mut egui::Ui, summary: &ProgramSummary) {
    if let Some(program) = &summary.program {
        ui.strong(program.display_name());
        ui.label(format!("Code: {}", program.degree_code));
        let details = [
            ("Faculty", &program.faculty),
            ("UAC", &program.uac_code),
            ("CRICOS", &program.cricos_code),
            ("Duration", &program.duration),
        ];
        for (name, value) in details {
            if let Some(value) = value {
                ui.label(format!("{name}: {value}"));
            }
        }
        if let Some(url) = &program.source_url {
            ui.hyperlink_to("Handbook", url);
        }
        ui.add_space(4.0);
    }
    ui.label(format!(
        "{} nodes | {} edges",
        summary.node_count, summary.edge_count
    ));
    ui.label(format!("Loaded courses: {}", summary.loaded_count()));
    ui.label(format!("Missing courses: {}", summary.missing_count()));

    let buckets = [
        LevelBucket::One,
        LevelBucket::Two,
        LevelBucket::Three,
        LevelBucket::Advanced,
        LevelBucket::Other,
    ];
    for (title, grouped) in [("Loaded", &summary.loaded), ("Missing", &summary.missing)] {
        egui::CollapsingHeader::new(title)
            .default_open(title == "Missing")
            .show(ui, |ui| {
                for bucket in buckets {
                    if let Some(codes) = grouped.get(&bucket) {
                        ui.label(format!("{}: {}", bucket.label(), codes.join(", ")));
                    }
                }
            });
    }
}

impl eframe::App for ViewerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        if let Some(err) = self.widget.take_error() {
            self.toasts.push(Toast {
                text: err.to_string(),
                expires_at: ctx.input(|i| i.time) + TOAST_SECONDS,
            });
        }

        egui::SidePanel::left("mindmesh_controls")
            .default_width(260.0)
            .show(ctx, |ui| {
                egui::ScrollArea::vertical().show(ui, |ui| self.render_controls(ui));
            });

        egui::CentralPanel::default()
            .frame(egui::Frame::none().fill(egui::Color32::from_rgb(15, 23, 42)))
            .show(ctx, |ui| self.widget.ui(ui));

        self.render_toasts(ctx);
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = Args::parse();
    let config = args.load_config()?;
    let scope = args.scope();
    info!(scope = %scope, "starting viewer");

    let widget = MindMeshWidget::new(scope, args.backend(), config)?;

    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title("MindMesh")
            .with_inner_size([1400.0, 900.0])
            .with_min_inner_size([900.0, 600.0]),
        ..Default::default()
    };

    match eframe::run_native(
        "MindMesh",
        native_options,
        Box::new(move |cc| {
            cc.egui_ctx.set_theme(egui::Theme::Dark);
            Ok(Box::new(ViewerApp::new(widget)) as Box<dyn eframe::App>)
        }),
    ) {
        Ok(()) => {
            info!("viewer shut down cleanly");
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "viewer error");
            Err(Box::new(e))
        }
    }
}
