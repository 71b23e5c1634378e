use num_cpus;
use serde_derive::Deserialize;
use serde_derive::Serialize;
use serde_json::{json, Map, Value};

use crate::exception::Exception;
use log::{error, info, warn};
use std::env;
use std::fs::File;
use std::io::prelude::*;

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Config {
    port: u16,
    worker_threads: usize,
    local: bool,
    /// 客户端构建清单（Vite manifest JSON）
    #[serde(default = "default_manifest_path")]
    manifest_path: String,
    /// 服务端预构建片段所在目录
    #[serde(default = "default_server_dir")]
    server_dir: String,
    /// 按模块划分的关键样式表（JSON），开启 `inline_styles` 时使用
    #[serde(default = "default_styles_path")]
    styles_path: String,
    #[serde(default = "default_mount_id")]
    mount_id: String,
    /// 全局关闭服务端渲染
    #[serde(default)]
    no_ssr: bool,
    /// 当前进程是否处于预渲染（静态站点生成）模式
    #[serde(default)]
    prerender: bool,
    #[serde(default)]
    payload_extraction: bool,
    #[serde(default)]
    inline_styles: bool,
    #[serde(default)]
    no_scripts: bool,
    #[serde(default)]
    runtime: RuntimeConfig,
}

/// 运行时配置：对本管线只读，`public` 与 `app` 部分会下发到客户端 payload。
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct RuntimeConfig {
    #[serde(default)]
    pub app: AppConfig,
    #[serde(default)]
    pub public: Map<String, Value>,
    #[serde(default)]
    pub private: Map<String, Value>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AppConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_build_assets_dir")]
    pub build_assets_dir: String,
    #[serde(default)]
    pub cdn_url: String,
}

fn default_manifest_path() -> String {
    "dist/client.manifest.json".to_string()
}

fn default_server_dir() -> String {
    "dist/server".to_string()
}

fn default_styles_path() -> String {
    "dist/styles.json".to_string()
}

fn default_mount_id() -> String {
    "__app".to_string()
}

fn default_base_url() -> String {
    "/".to_string()
}

fn default_build_assets_dir() -> String {
    "/_build/".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            build_assets_dir: default_build_assets_dir(),
            cdn_url: String::new(),
        }
    }
}

impl RuntimeConfig {
    /// 可以安全下发到客户端的子集：`{public, app}`。
    pub fn client_subset(&self) -> Value {
        json!({
            "public": self.public,
            "app": self.app,
        })
    }
}

impl Config {
    pub fn new() -> Self {
        Self {
            port: 7878,
            worker_threads: 0,
            local: true,
            manifest_path: default_manifest_path(),
            server_dir: default_server_dir(),
            styles_path: default_styles_path(),
            mount_id: default_mount_id(),
            no_ssr: false,
            prerender: false,
            payload_extraction: false,
            inline_styles: false,
            no_scripts: false,
            runtime: RuntimeConfig::default(),
        }
    }

    pub fn from_toml(filename: &str) -> Result<Self, Exception> {
        let mut file = File::open(filename)
            .map_err(|e| Exception::ConfigUnavailable(format!("no such file {}: {}", filename, e)))?;
        let mut str_val = String::new();
        file.read_to_string(&mut str_val)
            .map_err(|e| Exception::ConfigUnavailable(format!("error reading {}: {}", filename, e)))?;

        let mut raw_config = Self::from_toml_str(&str_val);
        raw_config.apply_env();
        Ok(raw_config)
    }

    pub fn from_toml_str(content: &str) -> Self {
        let mut raw_config: Config = match toml::from_str(content) {
            Ok(t) => t,
            Err(e) => {
                error!("无法成功从配置文件构建配置对象，使用默认配置：{}", e);
                Config::new()
            }
        };
        if raw_config.worker_threads == 0 {
            raw_config.worker_threads = num_cpus::get();
        }
        if raw_config.mount_id.is_empty() {
            warn!("mount_id被设置为空字符串，将改为默认值{}", default_mount_id());
            raw_config.mount_id = default_mount_id();
        }
        raw_config
    }

    /// 以环境变量覆盖渲染开关：`SSR_NO_SSR`、`SSR_PRERENDER`、`SSR_PAYLOAD_EXTRACTION`、
    /// `SSR_INLINE_STYLES`、`SSR_NO_SCRIPTS`。
    pub fn apply_env(&mut self) {
        let flags: [(&str, &mut bool); 5] = [
            ("SSR_NO_SSR", &mut self.no_ssr),
            ("SSR_PRERENDER", &mut self.prerender),
            ("SSR_PAYLOAD_EXTRACTION", &mut self.payload_extraction),
            ("SSR_INLINE_STYLES", &mut self.inline_styles),
            ("SSR_NO_SCRIPTS", &mut self.no_scripts),
        ];
        for (name, flag) in flags {
            if let Ok(value) = env::var(name) {
                *flag = parse_flag(&value);
                info!("环境变量{}覆盖配置：{}", name, *flag);
            }
        }
    }
}

fn parse_flag(value: &str) -> bool {
    !matches!(value.trim().to_lowercase().as_str(), "" | "0" | "false" | "no" | "off")
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn worker_threads(&self) -> usize {
        self.worker_threads
    }

    pub fn local(&self) -> bool {
        self.local
    }

    pub fn manifest_path(&self) -> &str {
        &self.manifest_path
    }

    pub fn server_dir(&self) -> &str {
        &self.server_dir
    }

    pub fn styles_path(&self) -> &str {
        &self.styles_path
    }

    pub fn mount_id(&self) -> &str {
        &self.mount_id
    }

    pub fn no_ssr(&self) -> bool {
        self.no_ssr
    }

    pub fn prerender(&self) -> bool {
        self.prerender
    }

    pub fn payload_extraction(&self) -> bool {
        self.payload_extraction
    }

    pub fn inline_styles(&self) -> bool {
        self.inline_styles
    }

    pub fn no_scripts(&self) -> bool {
        self.no_scripts
    }

    pub fn runtime(&self) -> &RuntimeConfig {
        &self.runtime
    }
}

impl Config {
    pub fn set_no_ssr(&mut self, value: bool) -> &mut Self {
        self.no_ssr = value;
        self
    }

    pub fn set_prerender(&mut self, value: bool) -> &mut Self {
        self.prerender = value;
        self
    }

    pub fn set_payload_extraction(&mut self, value: bool) -> &mut Self {
        self.payload_extraction = value;
        self
    }

    pub fn set_inline_styles(&mut self, value: bool) -> &mut Self {
        self.inline_styles = value;
        self
    }

    pub fn set_no_scripts(&mut self, value: bool) -> &mut Self {
        self.no_scripts = value;
        self
    }
}
