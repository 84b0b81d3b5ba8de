use clap::Parser;
use subscritrack::config::{Command, ReportKind};
use subscritrack::core::ConfigProvider;
use subscritrack::domain::model::{ChannelId, EnrollmentForm, SignupForm};
use subscritrack::utils::error::ErrorSeverity;
use subscritrack::utils::logger;
use subscritrack::{ApiClient, CliConfig, CommandOutput, LocalStorage, TrackerApp, TrackerError};

#[tokio::main]
async fn main() {
    let cli = CliConfig::parse();

    // 載入並驗證配置
    let settings = match cli.resolve() {
        Ok(settings) => settings,
        Err(e) => {
            logger::init_cli_logger(cli.verbose);
            tracing::error!("❌ Configuration validation failed: {}", e);
            tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
            eprintln!("❌ {}", e.user_friendly_message());
            std::process::exit(1);
        }
    };

    // 初始化日誌
    if settings.json_logs() {
        logger::init_json_logger(settings.log_level());
    } else {
        logger::init_cli_logger(cli.verbose);
    }

    tracing::info!("Starting subscritrack CLI");
    if cli.verbose {
        tracing::debug!("Settings: {:?}", settings);
    }

    let result = match ApiClient::from_config(&settings) {
        Ok(api) => {
            let storage = LocalStorage::new(settings.session_dir().to_string());
            let mut app = TrackerApp::new(api, storage);
            run(&mut app, cli.command).await
        }
        Err(e) => Err(e),
    };

    match result {
        Ok(output) => {
            if output.success {
                println!("{}", output.text);
            } else {
                eprintln!("{}", output.text);
                std::process::exit(1);
            }
        }
        Err(e) => exit_with(e),
    }
}

async fn run(
    app: &mut TrackerApp<ApiClient, LocalStorage>,
    command: Command,
) -> subscritrack::Result<CommandOutput> {
    match command {
        Command::Channels => app.channels().await,
        Command::Subscriptions { sort } => app.subscriptions(sort).await,
        Command::Report { kind } => match kind {
            ReportKind::Monthly => app.monthly_report().await,
            ReportKind::MonthToMonth => app.month_to_month_report().await,
        },
        Command::Enroll(args) => {
            let form = EnrollmentForm::new(args.start_date, args.due_date, args.monthly_bill)
                .with_times(args.start_time, args.due_time)
                .with_reminder(args.reminder_date, args.reminder_time);
            app.enroll(&ChannelId::new(args.channel_id), &form).await
        }
        Command::Signup(args) => {
            let form = SignupForm {
                email: args.email,
                password: args.password,
                name: args.name,
                given_name: args.given_name,
                family_name: args.family_name,
            };
            app.signup(&form).await
        }
        Command::Login { redirect_url } => app.login(&redirect_url).await,
        Command::Logout => app.logout().await,
        Command::Whoami => app.whoami().await,
    }
}

fn exit_with(e: TrackerError) -> ! {
    // 記錄詳細錯誤信息
    tracing::error!(
        "❌ Command failed: {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 {}", e.recovery_suggestion());

    // 根據錯誤嚴重程度決定退出碼
    let exit_code = match e.severity() {
        ErrorSeverity::Low => 0,
        ErrorSeverity::Medium => 2,
        ErrorSeverity::High => 1,
        ErrorSeverity::Critical => 3,
    };
    std::process::exit(exit_code)
}
