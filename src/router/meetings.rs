use crate::{
    logic::{
        self,
        access::Actor,
        grades::GradeForm,
        homework::HomeworkForm,
        meetings::{MeetingForm, RosterEntry},
        Context,
    },
    router::{
        auth::authed,
        util::{form, id, FutureExt},
    },
    schema::{Absence, AbsenceType, Grade, Meeting},
    view::{created, success},
};
use chrono::NaiveDate;
use serde_derive::Deserialize;
use warp::Filter;

pub fn timetable(ctx: &Context) -> Resp!() {
    #[derive(Debug, Deserialize)]
    struct Query {
        start: NaiveDate,
        end: NaiveDate,
    }

    warp::path::end()
        .and(authed(ctx))
        .and(warp::query())
        .and_then(|ctx: Context, actor: Actor, query: Query| {
            async move { logic::meetings::timetable(&ctx, &actor, query.start, query.end).await }
                .err_to_rejection()
        })
        .map(|meetings: Vec<Meeting>| success(meetings))
        .boxed()
}

pub fn create(ctx: &Context) -> Resp!() {
    warp::path::end()
        .and(authed(ctx))
        .and(form())
        .and_then(|ctx: Context, actor: Actor, form: MeetingForm| {
            async move { logic::meetings::create_meeting(&ctx, &actor, form).await }
                .err_to_rejection()
        })
        .map(|id: i32| created(id))
        .boxed()
}

pub fn get(ctx: &Context) -> Resp!() {
    id()
        .and(warp::path::end())
        .and(authed(ctx))
        .and_then(|id: i32, ctx: Context, actor: Actor| {
            async move { logic::meetings::get_meeting(&ctx, &actor, id).await }.err_to_rejection()
        })
        .map(|meeting: Meeting| success(meeting))
        .boxed()
}

pub fn patch(ctx: &Context) -> Resp!() {
    id()
        .and(warp::path::end())
        .and(authed(ctx))
        .and(form())
        .and_then(|id: i32, ctx: Context, actor: Actor, form: MeetingForm| {
            async move { logic::meetings::update_meeting(&ctx, &actor, id, form).await }
                .err_to_rejection()
        })
        .map(|meeting: Meeting| success(meeting))
        .boxed()
}

pub fn delete(ctx: &Context) -> Resp!() {
    id()
        .and(warp::path::end())
        .and(authed(ctx))
        .and_then(|id: i32, ctx: Context, actor: Actor| {
            async move { logic::meetings::delete_meeting(&ctx, &actor, id).await }
                .err_to_rejection()
        })
        .map(|()| success(()))
        .boxed()
}

pub fn absences(ctx: &Context) -> Resp!() {
    id()
        .and(warp::path("absences"))
        .and(warp::path::end())
        .and(authed(ctx))
        .and_then(|id: i32, ctx: Context, actor: Actor| {
            async move { logic::meetings::meeting_absences(&ctx, &actor, id).await }
                .err_to_rejection()
        })
        .map(|roster: Vec<RosterEntry>| success(roster))
        .boxed()
}

pub fn set_absence(ctx: &Context) -> Resp!() {
    #[derive(Debug, Deserialize)]
    struct Form {
        absence_type: AbsenceType,
        #[serde(default)]
        is_excused: bool,
    }

    id()
        .and(warp::path("absences"))
        .and(id())
        .and(warp::path::end())
        .and(authed(ctx))
        .and(form())
        .and_then(|meeting: i32, user: i32, ctx: Context, actor: Actor, form: Form| {
            async move {
                logic::meetings::set_absence(
                    &ctx,
                    &actor,
                    meeting,
                    user,
                    form.absence_type,
                    form.is_excused,
                )
                .await
            }
            .err_to_rejection()
        })
        .map(|absence: Absence| success(absence))
        .boxed()
}

pub fn grades(ctx: &Context) -> Resp!() {
    id()
        .and(warp::path("grades"))
        .and(warp::path::end())
        .and(authed(ctx))
        .and_then(|id: i32, ctx: Context, actor: Actor| {
            async move { logic::grades::meeting_grades(&ctx, &actor, id).await }.err_to_rejection()
        })
        .map(|grades: Vec<Grade>| success(grades))
        .boxed()
}

pub fn new_grade(ctx: &Context) -> Resp!() {
    id()
        .and(warp::path("grades"))
        .and(warp::path("new"))
        .and(warp::path::end())
        .and(authed(ctx))
        .and(form())
        .and_then(|id: i32, ctx: Context, actor: Actor, form: GradeForm| {
            async move { logic::grades::create_grade(&ctx, &actor, id, form).await }
                .err_to_rejection()
        })
        .map(|id: i32| created(id))
        .boxed()
}

pub fn new_homework(ctx: &Context) -> Resp!() {
    id()
        .and(warp::path("homework"))
        .and(warp::path("new"))
        .and(warp::path::end())
        .and(authed(ctx))
        .and(form())
        .and_then(|id: i32, ctx: Context, actor: Actor, form: HomeworkForm| {
            async move { logic::homework::create_homework(&ctx, &actor, id, form).await }
                .err_to_rejection()
        })
        .map(|id: i32| created(id))
        .boxed()
}
