//! App builder - wires store, creators and constraints into a running manager

use std::{future::Future, ops::Deref, pin::Pin, sync::Arc};

use jobwright_core::{
	JobCreator, JobKind, JobRegistry, Manager, ManagerConfig,
	constraint::ConstraintPredicate,
};
use jobwright_types::{job_store::JobStore, prelude::*};

use crate::opts::AppOpts;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Type alias for async initialization callbacks
type InitCallback = Box<dyn FnOnce(App) -> Pin<Box<dyn Future<Output = JwResult<()>> + Send>> + Send>;

pub struct AppBuilder {
	opts: AppOpts,
	store: Option<Arc<dyn JobStore>>,
	predicate: Option<Arc<dyn ConstraintPredicate>>,
	registry: Arc<JobRegistry>,
	creators: Vec<Arc<dyn JobCreator>>,
	on_init: Vec<InitCallback>,
}

impl AppBuilder {
	pub fn new() -> Self {
		let _ = tracing_subscriber::fmt()
			.with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
			.with_target(false)
			.try_init();
		Self::with_opts(AppOpts { config: ManagerConfig::default(), restore: true })
	}

	/// Like `new`, with options read from the environment
	pub fn from_env() -> JwResult<Self> {
		let mut builder = Self::new();
		builder.opts = AppOpts::from_env()?;
		Ok(builder)
	}

	pub fn with_opts(opts: AppOpts) -> Self {
		AppBuilder {
			opts,
			store: None,
			predicate: None,
			registry: Arc::new(JobRegistry::new()),
			creators: Vec::new(),
			on_init: Vec::new(),
		}
	}

	// Opts
	pub fn config(&mut self, config: ManagerConfig) -> &mut Self {
		self.opts.config = config;
		self
	}
	pub fn concurrency(&mut self, concurrency: usize) -> &mut Self {
		self.opts.config = self.opts.config.clone().with_concurrency(concurrency);
		self
	}
	pub fn queue(&mut self, name: &str, concurrency: usize) -> &mut Self {
		self.opts.config = self.opts.config.clone().with_queue(name, concurrency);
		self
	}
	pub fn restore(&mut self, restore: bool) -> &mut Self {
		self.opts.restore = restore;
		self
	}

	// Adapters
	pub fn store(&mut self, store: Arc<dyn JobStore>) -> &mut Self {
		self.store = Some(store);
		self
	}
	pub fn predicate(&mut self, predicate: Arc<dyn ConstraintPredicate>) -> &mut Self {
		self.predicate = Some(predicate);
		self
	}

	// Job kinds
	pub fn register<T: JobKind>(&mut self) -> JwResult<&mut Self> {
		self.registry.register::<T>()?;
		Ok(self)
	}

	/// Additional creator, asked after the built-in registry
	pub fn creator(&mut self, creator: Arc<dyn JobCreator>) -> &mut Self {
		self.creators.push(creator);
		self
	}

	/// Register an async callback that runs once the manager is up and
	/// persisted jobs are restored. Use it to submit startup jobs.
	pub fn on_init<F, Fut>(&mut self, f: F) -> &mut Self
	where
		F: FnOnce(App) -> Fut + Send + 'static,
		Fut: Future<Output = JwResult<()>> + Send + 'static,
	{
		self.on_init.push(Box::new(move |app| Box::pin(f(app))));
		self
	}

	pub async fn build(self) -> JwResult<App> {
		info!("jobwright V{}", VERSION);

		let mut builder = Manager::builder().config(self.opts.config).creator(self.registry);
		for creator in self.creators {
			builder = builder.creator(creator);
		}
		if let Some(store) = self.store {
			builder = builder.store(store);
		}
		if let Some(predicate) = self.predicate {
			builder = builder.predicate(predicate);
		}
		let app = App { manager: builder.build() };

		if self.opts.restore {
			let restored = app.manager.restore().await?;
			info!("Restored {} job(s)", restored);
		}

		for init in self.on_init {
			init(app.clone()).await?;
		}
		Ok(app)
	}
}

impl Default for AppBuilder {
	fn default() -> Self {
		Self::new()
	}
}

// App
//*****
#[derive(Clone, Debug)]
pub struct App {
	manager: Manager,
}

impl App {
	pub fn manager(&self) -> &Manager {
		&self.manager
	}

	/// Run until `signal` resolves, then shut the manager down
	pub async fn run_until<F: Future<Output = ()>>(self, signal: F) -> JwResult<()> {
		signal.await;
		info!("Shutdown requested");
		self.manager.shutdown().await
	}

	/// Run until Ctrl-C
	pub async fn run(self) -> JwResult<()> {
		self.run_until(async {
			if let Err(err) = tokio::signal::ctrl_c().await {
				error!("Cannot listen for Ctrl-C: {}", err);
			}
		})
		.await
	}
}

impl Deref for App {
	type Target = Manager;

	fn deref(&self) -> &Manager {
		&self.manager
	}
}

// vim: ts=4
