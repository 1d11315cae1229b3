use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use chromiumoxide::browser::{BrowserConfigBuilder, HeadlessMode};
use chromiumoxide::cdp::browser_protocol::emulation;
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::{BrowserConfig, Page};
use futures::StreamExt;
use include_dir::{Dir, include_dir};
use serde::de::DeserializeOwned;
use serde_json as json;
use tempfile::TempDir;
use tokio::task::JoinHandle;
use url::Url;

use crate::browser::evaluation::{evaluate_expression, evaluate_function_call};
use crate::result::{Result, StepError};
use crate::session::{ElementProbe, PageSession, Selector};
use crate::wait::Timeout;

pub mod evaluation;

#[derive(Clone, Debug)]
pub struct BrowserOptions {
    pub headless: bool,
    pub no_sandbox: bool,
    pub width: u16,
    pub height: u16,
    pub navigation_timeout: Timeout,
    /// Falls back to chromiumoxide's lookup of an installed Chrome/Chromium.
    pub executable: Option<PathBuf>,
}

impl Default for BrowserOptions {
    fn default() -> Self {
        BrowserOptions {
            headless: true,
            no_sandbox: false,
            width: 1280,
            height: 720,
            navigation_timeout: Timeout::from_secs(30),
            executable: None,
        }
    }
}

/// A single Chromium tab driven over CDP. Owns the browser process and its
/// profile directory; both go away on `close` (or drop).
pub struct BrowserSession {
    browser: chromiumoxide::Browser,
    handler: JoinHandle<()>,
    page: Page,
    navigation_timeout: Timeout,
    _user_data_directory: TempDir,
    _crash_dumps_directory: TempDir,
}

static SCRIPTS: Dir = include_dir!("$CARGO_MANIFEST_DIR/src/browser/scripts");

impl BrowserSession {
    pub async fn open(options: &BrowserOptions) -> anyhow::Result<Self> {
        let user_data_directory = TempDir::new()?;
        let crash_dumps_directory = TempDir::new()?;
        let config = browser_options_to_config(
            options,
            user_data_directory.path(),
            crash_dumps_directory.path(),
        )?;
        let (browser, mut handler) = chromiumoxide::Browser::launch(config)
            .await
            .context("launch browser")?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(error) = event {
                    log::debug!("browser handler error: {}", error);
                }
            }
        });

        let page = browser.new_page("about:blank").await?;
        page.execute(
            emulation::SetDeviceMetricsOverrideParams::builder()
                .width(options.width)
                .height(options.height)
                .device_scale_factor(1.0)
                .mobile(false)
                .build()
                .map_err(|err| {
                    anyhow!(err)
                        .context("build SetDeviceMetricsOverrideParams failed")
                })?,
        )
        .await?;
        log::debug!("browser ready ({}x{})", options.width, options.height);

        Ok(BrowserSession {
            browser,
            handler,
            page,
            navigation_timeout: options.navigation_timeout,
            _user_data_directory: user_data_directory,
            _crash_dumps_directory: crash_dumps_directory,
        })
    }

    async fn run_script<Output: DeserializeOwned>(
        &self,
        name: &str,
        arguments: Vec<json::Value>,
    ) -> Result<Output> {
        let script_path = format!("{}.js", name);
        let script_contents = SCRIPTS
            .get_file(&script_path)
            .and_then(|file| file.contents_utf8())
            .ok_or_else(|| {
                StepError::Evaluation(format!("missing script {}", script_path))
            })?;

        evaluate_function_call(&self.page, script_contents, arguments)
            .await
            .map_err(|err| match err {
                StepError::Evaluation(message) => StepError::Evaluation(
                    format!(
                        "script call ({}) failed: {}",
                        script_path, message
                    ),
                ),
                other => other,
            })
    }
}

impl PageSession for BrowserSession {
    async fn navigate(&mut self, url: &Url) -> Result<()> {
        if url.scheme() == "file" {
            let path =
                url.to_file_path().map_err(|()| StepError::Navigation {
                    url: url.to_string(),
                    reason: "not a local file path".to_string(),
                })?;
            if !path.is_file() {
                return Err(StepError::Navigation {
                    url: url.to_string(),
                    reason: format!("{} does not exist", path.display()),
                });
            }
        }

        log::info!("navigating to {}", url);
        match tokio::time::timeout(
            self.navigation_timeout.to_duration(),
            self.page.goto(url.to_string()),
        )
        .await
        {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(error)) => Err(StepError::Navigation {
                url: url.to_string(),
                reason: error.to_string(),
            }),
            Err(_) => Err(StepError::Navigation {
                url: url.to_string(),
                reason: format!(
                    "not loaded within {}ms",
                    self.navigation_timeout.0
                ),
            }),
        }
    }

    async fn inject_global(
        &mut self,
        name: &str,
        value: &json::Value,
    ) -> Result<()> {
        log::debug!("setting globalThis.{} = {}", name, value);
        let _: json::Value = self
            .run_script(
                "inject_global",
                vec![json::Value::String(name.to_string()), value.clone()],
            )
            .await?;
        Ok(())
    }

    async fn evaluate(&mut self, script: &str) -> Result<json::Value> {
        evaluate_expression(&self.page, script).await
    }

    async fn probe(&mut self, selector: &Selector) -> Result<ElementProbe> {
        self.run_script(
            "probe",
            vec![json::Value::String(selector.as_str().to_string())],
        )
        .await
    }

    async fn screenshot(&mut self) -> Result<Vec<u8>> {
        let data = self
            .page
            .screenshot(
                ScreenshotParams::builder()
                    .format(CaptureScreenshotFormat::Png)
                    .build(),
            )
            .await?;
        Ok(data)
    }

    async fn close(self) -> anyhow::Result<()> {
        let BrowserSession {
            browser, handler, ..
        } = self;
        // browser.close() logs a websocket error on every shutdown
        // (https://github.com/mattsse/chromiumoxide/issues/287), so the
        // process is killed by dropping the handle instead.
        drop(browser);
        handler.abort();
        log::debug!("browser closed");
        Ok(())
    }
}

fn browser_options_to_config(
    browser_options: &BrowserOptions,
    user_data_directory: &Path,
    crash_dumps_directory: &Path,
) -> anyhow::Result<BrowserConfig> {
    let apply_sandbox =
        |builder: BrowserConfigBuilder| -> BrowserConfigBuilder {
            if browser_options.no_sandbox {
                builder.no_sandbox().args([
                    "--disable-setuid-sandbox",
                    "--disable-dev-shm-usage",
                ])
            } else {
                builder
            }
        };
    let apply_executable =
        |builder: BrowserConfigBuilder| -> BrowserConfigBuilder {
            if let Some(executable) = &browser_options.executable {
                builder.chrome_executable(executable)
            } else {
                builder
            }
        };
    let crash_dumps_directory = crash_dumps_directory
        .to_str()
        .ok_or(anyhow!("crash dumps directory is not valid unicode"))?;
    apply_executable(apply_sandbox(BrowserConfig::builder()))
        .headless_mode(if browser_options.headless {
            HeadlessMode::New
        } else {
            HeadlessMode::False
        })
        .window_size(
            browser_options.width as u32,
            browser_options.height as u32,
        )
        .user_data_dir(user_data_directory)
        .args([
            format!("--crash-dumps-dir={}", crash_dumps_directory),
            "--no-crashpad".to_string(),
            "--disable-crash-reporter".to_string(),
            // Lets the page under test load sibling files over file://.
            "--allow-file-access-from-files".to_string(),
        ])
        .build()
        .map_err(|s| anyhow!(s))
}
