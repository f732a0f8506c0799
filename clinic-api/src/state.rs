use clinic_booking::AppointmentService;
use clinic_core::ClinicContext;
use clinic_directory::DoctorService;
use clinic_identity::IdentityService;
use clinic_notify::NotificationService;

/// Everything a handler can reach, shared through a request extension.
#[derive(Clone)]
pub struct Services {
    pub ctx: ClinicContext,
    pub identity: IdentityService,
    pub doctors: DoctorService,
    pub appointments: AppointmentService,
    pub notifications: NotificationService,
}

impl Services {
    pub fn new(ctx: ClinicContext) -> Self {
        Services {
            identity: IdentityService::new(ctx.clone()),
            doctors: DoctorService::new(ctx.clone()),
            appointments: AppointmentService::new(ctx.clone()),
            notifications: NotificationService::new(ctx.clone()),
            ctx,
        }
    }
}
