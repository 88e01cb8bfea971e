//! `splia onboard`: submit the laundromat details to the provisioning
//! webhook and keep the returned QR code for `splia connect`.

use anyhow::Context as _;

use splia_core::Route;
use splia_core::validation::validate_laundromat_name;

use crate::cli::{OnboardOpts, command_for};
use crate::context::AppContext;
use crate::storage::{INSTANCE_NAME_KEY, LocalStorage, PAIRING_IMAGE_KEY};
use crate::webhook::{OnboardingForm, Provisioned, submit_onboarding};

pub async fn cmd_onboard(ctx: &AppContext, opts: &OnboardOpts) -> anyhow::Result<()> {
    let session = ctx.require_session()?;
    validate_laundromat_name(&opts.name)?;
    let webhook_url = ctx
        .webhook_url
        .as_deref()
        .context("no onboarding webhook configured (set SPLIA_WEBHOOK_URL)")?;

    let form = OnboardingForm {
        email: session.email.clone(),
        laundromat_name: opts.name.trim().to_string(),
        phone: non_blank(opts.phone.as_deref()),
        address: non_blank(opts.address.as_deref()),
    };
    println!("Configurando sua lavanderia...");
    let provisioned = submit_onboarding(&ctx.http, webhook_url, &form).await?;
    store_provisioned(&ctx.storage(), &provisioned)?;
    tracing::info!(
        email = %session.email,
        instance = provisioned.instance.as_ref().map(|h| h.as_str()).unwrap_or("-"),
        "onboarding complete"
    );

    println!("Lavanderia configurada! Agora conecte seu WhatsApp.");
    println!("Próximo passo: {}", command_for(Route::ConnectWhatsApp));
    Ok(())
}

pub(crate) fn store_provisioned(storage: &LocalStorage, provisioned: &Provisioned) -> anyhow::Result<()> {
    storage
        .set(PAIRING_IMAGE_KEY, provisioned.image.as_stored())
        .context("storing QR code")?;
    if let Some(ref instance) = provisioned.instance {
        storage
            .set(INSTANCE_NAME_KEY, instance.as_str())
            .context("storing instance name")?;
    }
    Ok(())
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
