// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # SSR 渲染服务
//!
//! 基于 Tokio 运行时的多线程渲染服务：
//! - 把每个 TCP 连接上的请求交给 `RenderHandler` 渲染
//! - 渲染失败时改走错误页渲染，错误页也失败时返回静态错误页
//! - 后台管理控制台（CLI 指令交互）

use ssr_renderer::{
    param::{ERROR_PREFIX, STATUS_CODES},
    Config, Exception, HtmlBuilder, HttpRequestMethod, RenderHandler, RenderResponse, Request,
};

use log::{debug, error, info, warn};
use tokio::{
    io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader},
    net::{TcpListener, TcpStream},
    runtime::Builder,
};

use std::{
    net::{Ipv4Addr, SocketAddrV4},
    sync::{Arc, Mutex, PoisonError},
    time::Instant,
};

/// 单个请求报文的读取上限
const BUFFER_SIZE: usize = 16 * 1024;

fn main() {
    // 1. 初始化日志系统：通过外部 YAML 配置级别与输出目的地
    if let Err(e) = log4rs::init_file("config/log4rs.yaml", Default::default()) {
        eprintln!("无法初始化日志系统：{}", e);
    }

    // 2. 加载配置，环境变量可以覆盖渲染开关
    let config = match Config::from_toml("config/development.toml") {
        Ok(config) => config,
        Err(e) => {
            warn!("{}，使用默认配置", e);
            let mut config = Config::new();
            config.apply_env();
            config
        }
    };
    info!("配置文件已载入");
    info!(
        "no_ssr={}, prerender={}, payload_extraction={}, inline_styles={}, no_scripts={}",
        config.no_ssr(),
        config.prerender(),
        config.payload_extraction(),
        config.inline_styles(),
        config.no_scripts()
    );

    // 3. 按配置的工作线程数构建运行时
    let runtime = match Builder::new_multi_thread()
        .worker_threads(config.worker_threads().max(1))
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("无法创建Tokio运行时：{}", e);
            return;
        }
    };

    runtime.block_on(serve(config));
}

async fn serve(config: Config) {
    let port = config.port();
    let address = match config.local() {
        true => Ipv4Addr::new(127, 0, 0, 1),
        false => Ipv4Addr::new(0, 0, 0, 0),
    };
    info!("服务端将在{}:{}上监听Socket连接", address, port);

    let listener = match TcpListener::bind(SocketAddrV4::new(address, port)).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("无法绑定端口：{}，错误：{}", port, e);
            return;
        }
    };
    info!("端口{}绑定完成", port);

    let handler = Arc::new(RenderHandler::from_config(config));

    // shutdown_flag: 停机标志；active_connection: 当前并发连接数
    let shutdown_flag = Arc::new(Mutex::new(false));
    let active_connection = Arc::new(Mutex::new(0u32));

    // 后台管理控制台
    tokio::spawn({
        let shutdown_flag = Arc::clone(&shutdown_flag);
        let active_connection = Arc::clone(&active_connection);
        let handler = Arc::clone(&handler);
        async move {
            let mut reader = BufReader::new(tokio::io::stdin());
            let mut input = String::new();
            loop {
                input.clear();
                match reader.read_line(&mut input).await {
                    Ok(0) | Err(_) => break,
                    Ok(_) => {}
                }
                let cmd = input.trim();
                match cmd {
                    "stop" => {
                        *shutdown_flag.lock().unwrap_or_else(PoisonError::into_inner) = true;
                        println!("停机指令已激活，服务器将在处理完下一个请求后关闭...");
                        break;
                    }
                    "help" => {
                        println!("== SSR Renderer Help ==");
                        println!("stop   - 发出停机信号");
                        println!("status - 查看当前服务器运行状态");
                        println!("help   - 显示此帮助信息");
                        println!("=======================");
                    }
                    "status" => {
                        let active_count = *active_connection.lock().unwrap_or_else(PoisonError::into_inner);
                        let renderers = handler.renderers();
                        println!("== SSR Renderer 状态 ==");
                        println!("当前活跃连接数: {}", active_count);
                        println!("SSR渲染器构造次数: {}", renderers.ssr_attempts());
                        println!("SPA渲染器构造次数: {}", renderers.spa_attempts());
                        match handler.payload_cache() {
                            Some(cache) => println!("payload模块缓存: {}条", cache.len()),
                            None => println!("payload模块缓存: 未启用"),
                        }
                        println!("=======================");
                    }
                    _ => println!("无效的命令：{}", cmd),
                }
            }
        }
    });

    let mut id: u128 = 0;

    loop {
        if *shutdown_flag.lock().unwrap_or_else(PoisonError::into_inner) {
            info!("主循环接收到停机指令，正在退出...");
            break;
        }

        let (mut stream, addr) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                error!("接受连接失败：{}", e);
                continue;
            }
        };
        debug!("[ID{}]新的连接：{}", id, addr);

        let active_connection = Arc::clone(&active_connection);
        let handler = Arc::clone(&handler);
        tokio::spawn(async move {
            *active_connection.lock().unwrap_or_else(PoisonError::into_inner) += 1;
            handle_connection(&mut stream, id, &handler).await;
            *active_connection.lock().unwrap_or_else(PoisonError::into_inner) -= 1;
        });
        id += 1;
    }
}

/// # 连接处理器
///
/// 读取并解析请求，交给渲染处理器，把结果写回 TCP 流。
async fn handle_connection(stream: &mut TcpStream, id: u128, handler: &RenderHandler) {
    let mut buffer = vec![0; BUFFER_SIZE];
    match stream.read(&mut buffer).await {
        Ok(0) => return,
        Ok(_) => {}
        Err(e) => {
            error!("[ID{}]读取TCPStream时遇到错误: {}", id, e);
            return;
        }
    }
    debug!("[ID{}]HTTP请求接收完毕", id);

    let start_time = Instant::now();

    let request = match Request::try_from(&buffer, id) {
        Ok(request) => request,
        Err(e) => {
            warn!("[ID{}]解析HTTP请求失败: {}", id, e);
            let response = static_error_page(e.status_code(), None);
            if let Err(e) = stream.write_all(&response.as_bytes(false)).await {
                error!("[ID{}]发送响应失败: {}", id, e);
            }
            return;
        }
    };
    debug!("[ID{}]成功解析HTTP请求", id);

    let response = match handler.handle(&request, id).await {
        Ok(Some(response)) => response,
        Ok(None) => RenderResponse::html(String::new()).with_status(204, None),
        Err(e) => {
            warn!("[ID{}]渲染{}失败：{}", id, request.path(), e);
            render_error_page(handler, &request, &e, id).await
        }
    };

    info!(
        "[ID{}] {}, {}, {}, {}, {}ms, {}",
        id,
        request.version(),
        request.path(),
        request.method(),
        response.status_code(),
        start_time.elapsed().as_millis(),
        request.user_agent(),
    );

    let headonly = request.method() == HttpRequestMethod::Head;
    let bytes = response.as_bytes(headonly);
    debug!("[ID{}]发送响应，长度: {}", id, bytes.len());
    if let Err(e) = stream.write_all(&bytes).await {
        error!("[ID{}]发送响应失败: {}", id, e);
        return;
    }
    let _ = stream.flush().await;
}

/// 把失败的请求改写为错误页请求重新渲染；错误页本身也无法渲染时返回静态页面。
async fn render_error_page(handler: &RenderHandler, request: &Request, e: &Exception, id: u128) -> RenderResponse {
    let status_code = e.status_code();
    let status_message = e
        .status_message()
        .map(str::to_string)
        .unwrap_or_else(|| STATUS_CODES.get(&status_code).copied().unwrap_or("Error").to_string());
    let query = serde_urlencoded::to_string([
        ("url", request.path().to_string()),
        ("statusCode", status_code.to_string()),
        ("statusMessage", status_message.clone()),
        ("message", e.to_string()),
    ])
    .unwrap_or_default();
    let error_request = Request::new(HttpRequestMethod::Get, &format!("{}?{}", ERROR_PREFIX, query));

    match handler.handle(&error_request, id).await {
        Ok(Some(response)) => response,
        Ok(None) => {
            warn!("[ID{}]错误页没有产出内容，使用静态错误页", id);
            static_error_page(status_code, Some(&status_message))
        }
        Err(e) => {
            error!("[ID{}]错误页渲染失败：{}", id, e);
            static_error_page(status_code, Some(&status_message))
        }
    }
}

fn static_error_page(status_code: u16, note: Option<&str>) -> RenderResponse {
    RenderResponse::html(HtmlBuilder::from_status_code(status_code, note).build()).with_status(status_code, None)
}
